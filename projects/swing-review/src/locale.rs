use crate::payload::{AnalysisStatus, ViewAngle};
use crate::record::{Judgment, WorstLabel};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    Zh,
    En,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Zh => Self::En,
            Self::En => Self::Zh,
        }
    }

    /// Translate a label key, falling back to the key itself.
    pub fn text<'a>(&self, key: &'a str) -> &'a str {
        let table = match self {
            Self::Zh => ZH,
            Self::En => EN,
        };
        table
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap_or(key)
    }

    pub fn status(&self, status: AnalysisStatus) -> &'static str {
        match status {
            AnalysisStatus::Pending => self.text("status_pending"),
            AnalysisStatus::Processing => self.text("status_processing"),
            AnalysisStatus::Completed => self.text("status_completed"),
            AnalysisStatus::Failed => self.text("status_failed"),
            AnalysisStatus::Unknown => status.as_str(),
        }
    }

    pub fn view_angle(&self, view: ViewAngle) -> &'static str {
        match view {
            ViewAngle::Side => self.text("angle_side"),
            ViewAngle::Front => self.text("angle_front"),
        }
    }

    pub fn judgment(&self, judgment: Judgment) -> &'static str {
        match judgment {
            Judgment::Standard => self.text("status_standard"),
            Judgment::Minor => self.text("status_minor_deviation"),
            Judgment::Abnormal => self.text("status_abnormal"),
        }
    }

    pub fn worst_label(&self, label: WorstLabel) -> &'static str {
        match label {
            WorstLabel::Normal => self.text("status_standard"),
            WorstLabel::SlightExceed => self.text("status_slight_exceed"),
            WorstLabel::SevereInsufficient => self.text("status_severe_insufficient"),
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "zh" || lower.starts_with("zh-") || lower.starts_with("zh_") {
            Ok(Self::Zh)
        } else if lower == "en" || lower.starts_with("en-") || lower.starts_with("en_") {
            Ok(Self::En)
        } else {
            Err(format!("unsupported locale: {}", s))
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The eight fixed swing phases, in event-index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwingPhase {
    Setup,
    Takeaway,
    Backswing,
    Top,
    Downswing,
    Impact,
    FollowThrough,
    Finish,
}

impl SwingPhase {
    pub const ALL: [SwingPhase; 8] = [
        Self::Setup,
        Self::Takeaway,
        Self::Backswing,
        Self::Top,
        Self::Downswing,
        Self::Impact,
        Self::FollowThrough,
        Self::Finish,
    ];

    /// Phase for a 1-based event index.
    pub fn from_event_index(index: u8) -> Option<Self> {
        let slot = usize::from(index).checked_sub(1)?;
        Self::ALL.get(slot).copied()
    }

    pub fn event_index(&self) -> u8 {
        match self {
            Self::Setup => 1,
            Self::Takeaway => 2,
            Self::Backswing => 3,
            Self::Top => 4,
            Self::Downswing => 5,
            Self::Impact => 6,
            Self::FollowThrough => 7,
            Self::Finish => 8,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Setup => "event_setup",
            Self::Takeaway => "event_takeaway",
            Self::Backswing => "event_backswing",
            Self::Top => "event_top",
            Self::Downswing => "event_downswing",
            Self::Impact => "event_impact",
            Self::FollowThrough => "event_follow_through",
            Self::Finish => "event_finish",
        }
    }

    pub fn label(&self, locale: Locale) -> &'static str {
        locale.text(self.key())
    }
}

type Table = &'static [(&'static str, &'static str)];

const ZH: Table = &[
    ("event_setup", "准备"),
    ("event_takeaway", "起摆"),
    ("event_backswing", "上杆"),
    ("event_top", "顶点"),
    ("event_downswing", "下杆"),
    ("event_impact", "击球瞬间"),
    ("event_follow_through", "送杆"),
    ("event_finish", "收杆"),
    ("status_pending", "等待中"),
    ("status_processing", "处理中"),
    ("status_completed", "已完成"),
    ("status_failed", "失败"),
    ("status_severe_insufficient", "严重不足"),
    ("status_slight_exceed", "略微超标"),
    ("status_minor_deviation", "轻微偏差"),
    ("status_abnormal", "异常"),
    ("status_standard", "标准"),
    ("angle_side", "侧面"),
    ("angle_front", "正面"),
    ("cat_kinematic", "运动学指标"),
    ("cat_rotation", "旋转指标"),
    ("cat_posture", "姿态指标"),
    ("cat_displacement", "位移指标"),
    ("cat_energy", "能量指标"),
    ("cat_other", "其他指标"),
    ("metric_shoulder_rot", "肩线旋转(相对)"),
    ("metric_hip_rot", "髋线旋转(相对)"),
    ("metric_body_tilt", "身体前倾角"),
    ("metric_hip_dx", "髋部X位移"),
    ("metric_shoulder_dx", "肩部中心X位移"),
    ("metric_left_hand_dx", "左手X位移"),
    ("metric_energy_index", "能量指数(X-Factor)"),
    ("metric_trunk_dy", "躯干中心Y位移"),
    ("metric_shoulder_tilt", "肩线倾斜角"),
    ("metric_hip_tilt", "髋线倾斜角"),
    ("metric_left_hip_dx", "左髋X轴位移"),
    ("metric_abnormal_count", "异常指标数(帧级)"),
    ("metric_minor_count", "轻微偏差指标数(帧级)"),
    ("metric_shoulder_z_angle", "肩线与Z轴夹角"),
    ("metric_hip_z_angle", "髋线与Z轴夹角"),
    ("metric_shoulder_hip_diff", "肩线旋转减髋线旋转"),
    ("metric_body_y_angle", "身体平面与Y轴夹角"),
    ("metric_head_dx", "头部X轴位移"),
    ("metric_head_dy", "头部Y轴位移"),
    ("metric_spine_angle", "脊柱倾角"),
    ("metric_left_head_dx", "左脑X轴位移"),
    ("metric_right_head_dx", "右脑X轴位移"),
    ("alert_no_abnormal", "该指标在所有帧中均无异常"),
    ("no_data", "暂无数据"),
];

const EN: Table = &[
    ("event_setup", "Setup"),
    ("event_takeaway", "Takeaway"),
    ("event_backswing", "Backswing"),
    ("event_top", "Top"),
    ("event_downswing", "Downswing"),
    ("event_impact", "Impact"),
    ("event_follow_through", "Follow Through"),
    ("event_finish", "Finish"),
    ("status_pending", "Pending"),
    ("status_processing", "Processing"),
    ("status_completed", "Completed"),
    ("status_failed", "Failed"),
    ("status_severe_insufficient", "Severely Insufficient"),
    ("status_slight_exceed", "Slightly Exceeded"),
    ("status_minor_deviation", "Minor Deviation"),
    ("status_abnormal", "Abnormal"),
    ("status_standard", "Standard"),
    ("angle_side", "Down the Line (Side)"),
    ("angle_front", "Face On (Front)"),
    ("cat_kinematic", "Kinematic Metrics"),
    ("cat_rotation", "Rotation Metrics"),
    ("cat_posture", "Posture Metrics"),
    ("cat_displacement", "Displacement Metrics"),
    ("cat_energy", "Energy Metrics"),
    ("cat_other", "Other Metrics"),
    ("metric_shoulder_rot", "Shoulder Rotation (Rel)"),
    ("metric_hip_rot", "Hip Rotation (Rel)"),
    ("metric_body_tilt", "Body Tilt"),
    ("metric_hip_dx", "Hip X Displacement"),
    ("metric_shoulder_dx", "Shoulder Center X Displacement"),
    ("metric_left_hand_dx", "Left Hand X Displacement"),
    ("metric_energy_index", "Energy Index (X-Factor)"),
    ("metric_trunk_dy", "Trunk Center Y Displacement"),
    ("metric_shoulder_tilt", "Shoulder Tilt"),
    ("metric_hip_tilt", "Hip Tilt"),
    ("metric_left_hip_dx", "Left Hip X Displacement"),
    ("metric_abnormal_count", "Abnormal Metrics Count (Frame)"),
    ("metric_minor_count", "Minor Deviation Count (Frame)"),
    ("metric_shoulder_z_angle", "Shoulder-Z Angle"),
    ("metric_hip_z_angle", "Hip-Z Angle"),
    ("metric_shoulder_hip_diff", "Shoulder-Hip Rotation Diff"),
    ("metric_body_y_angle", "Body Plane-Y Angle"),
    ("metric_head_dx", "Head X Displacement"),
    ("metric_head_dy", "Head Y Displacement"),
    ("metric_spine_angle", "Spine Angle"),
    ("metric_left_head_dx", "Left Head X Displacement"),
    ("metric_right_head_dx", "Right Head X Displacement"),
    ("alert_no_abnormal", "No abnormalities found for this metric in any frame"),
    ("no_data", "No Data"),
];
