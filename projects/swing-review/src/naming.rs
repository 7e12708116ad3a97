use crate::locale::Locale;
use crate::payload::MetricStandard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDefinition {
    /// Label key
    pub name: &'static str,
    pub unit: &'static str,
    /// Category label key
    pub category: &'static str,
}

const fn def(name: &'static str, unit: &'static str, category: &'static str) -> MetricDefinition {
    MetricDefinition {
        name,
        unit,
        category,
    }
}

pub const KEYFRAME_METRIC_DEFINITIONS: &[(&str, MetricDefinition)] = &[
    ("shoulder_rot_rel_deg", def("metric_shoulder_rot", "°", "cat_rotation")),
    ("hip_rot_rel_deg", def("metric_hip_rot", "°", "cat_rotation")),
    ("body_tilt_yz_deg", def("metric_body_tilt", "°", "cat_posture")),
    ("hip_dx", def("metric_hip_dx", "m", "cat_displacement")),
    ("shoulder_center_dx", def("metric_shoulder_dx", "m", "cat_displacement")),
    ("left_hand_dx", def("metric_left_hand_dx", "m", "cat_displacement")),
    ("energy_index", def("metric_energy_index", "°", "cat_energy")),
    ("trunk_mid_dy", def("metric_trunk_dy", "m", "cat_displacement")),
    ("shoulder_tilt_deg", def("metric_shoulder_tilt", "°", "cat_posture")),
    ("hip_tilt_deg", def("metric_hip_tilt", "°", "cat_posture")),
];

pub const FRAME_METRIC_MAPPING: &[(&str, &str)] = &[
    ("右髋X轴位移", "metric_hip_dx"),
    ("左手X轴位移", "metric_left_hand_dx"),
    ("左髋X轴位移", "metric_left_hip_dx"),
    ("异常指标数_帧级", "metric_abnormal_count"),
    ("轻微偏差指标数_帧级", "metric_minor_count"),
    ("肩线与Z轴夹角_左正右负_近端终点_XZ平面", "metric_shoulder_z_angle"),
    ("肩线与Z轴夹角_度_左正右负_近端终点_XZ平面", "metric_shoulder_z_angle"),
    ("髋线与Z轴夹角_度_左正右负_近端终点_XZ平面", "metric_hip_z_angle"),
    ("肩线中心X轴位移", "metric_shoulder_dx"),
    ("肩线旋转减髋线旋转", "metric_shoulder_hip_diff"),
    ("肩线旋转减髋线旋转_度", "metric_shoulder_hip_diff"),
    ("身体平面与Y轴夹角_X轴为0向上为正_0到180", "metric_body_y_angle"),
    ("身体平面与Y轴夹角_度_X轴为0向上为正_0到180", "metric_body_y_angle"),
    ("头部X轴位移", "metric_head_dx"),
    ("头部Y轴位移", "metric_head_dy"),
    ("脊柱倾角", "metric_spine_angle"),
    ("左脑X轴位移", "metric_left_head_dx"),
    ("右脑X轴位移", "metric_right_head_dx"),
    ("肩线与Z轴夹角", "metric_shoulder_z_angle"),
    ("髋线与Z轴夹角", "metric_hip_z_angle"),
];

const CATEGORY_MAP: &[(&str, &str)] = &[
    ("运动学指标", "cat_kinematic"),
    ("旋转指标", "cat_rotation"),
    ("姿态指标", "cat_posture"),
    ("位移指标", "cat_displacement"),
    ("能量指标", "cat_energy"),
    ("其他指标", "cat_other"),
];

const DEFAULT_CATEGORY: &str = "cat_other";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameTier {
    Definition,
    Mapping,
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName {
    /// Label key, or the raw metric key on passthrough
    pub key: String,
    pub tier: NameTier,
}

impl DisplayName {
    pub fn text<'a>(&'a self, locale: Locale) -> &'a str {
        locale.text(&self.key)
    }
}

pub fn definition(metric: &str) -> Option<&'static MetricDefinition> {
    KEYFRAME_METRIC_DEFINITIONS
        .iter()
        .find(|(k, _)| *k == metric)
        .map(|(_, d)| d)
}

pub fn resolve_display(metric: &str) -> DisplayName {
    if let Some(d) = definition(metric) {
        return DisplayName {
            key: d.name.to_string(),
            tier: NameTier::Definition,
        };
    }
    if let Some((_, key)) = FRAME_METRIC_MAPPING.iter().find(|(k, _)| *k == metric) {
        return DisplayName {
            key: key.to_string(),
            tier: NameTier::Mapping,
        };
    }
    DisplayName {
        key: metric.to_string(),
        tier: NameTier::Passthrough,
    }
}

/// Category label key for a raw category from the standards table.
pub fn resolve_category(raw: &str) -> String {
    let raw = raw.trim();
    if let Some((_, key)) = CATEGORY_MAP.iter().find(|(k, _)| *k == raw) {
        return key.to_string();
    }
    if raw.is_empty() {
        return DEFAULT_CATEGORY.to_string();
    }
    raw.to_string()
}

/// Everything a metric card header needs.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub display: DisplayName,
    pub category: String,
    pub unit: String,
    pub lower_limit: Option<f64>,
    pub upper_limit: Option<f64>,
}

/// Combine name resolution with the metric's standard row, when there is one.
/// The standard wins for unit and category; the definition fills the gaps.
pub fn describe_metric(metric: &str, standard: Option<&MetricStandard>) -> MetricDescriptor {
    let definition = definition(metric);

    let category = standard
        .and_then(|s| s.category.as_deref())
        .filter(|c| !c.trim().is_empty())
        .map(resolve_category)
        .or_else(|| definition.map(|d| d.category.to_string()))
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let unit = standard
        .and_then(|s| s.unit.as_deref())
        .filter(|u| !u.is_empty())
        .or(definition.map(|d| d.unit))
        .unwrap_or_default()
        .to_string();

    MetricDescriptor {
        display: resolve_display(metric),
        category,
        unit,
        lower_limit: standard.and_then(|s| s.lower_limit),
        upper_limit: standard.and_then(|s| s.upper_limit),
    }
}
