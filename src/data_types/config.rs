use crate::cap::{Cap, DEFAULT_OTHERS_LABEL};
use crate::error::{ChartError, Result};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};

/// Serializable settings of a capped/stacked chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of ranked entries kept; `None` keeps everything.
    pub cap: Option<i64>,
    pub others_label: String,
    /// `false` overlays the layers on a shared zero baseline.
    pub stacked: bool,
    pub full_stack_data: bool,
    pub hidable_stacks: bool,
    /// Color by layer name instead of by key. Left unset, the chart decides.
    pub stacked_color: Option<bool>,
    pub y_axis_padding: f64,
    pub hidden_stacks: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cap: None,
            others_label: DEFAULT_OTHERS_LABEL.to_string(),
            stacked: true,
            full_stack_data: false,
            hidable_stacks: false,
            stacked_color: None,
            y_axis_padding: 0.0,
            hidden_stacks: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> eyre::Result<Self> {
        let config: Self =
            serde_json::from_str(json).wrap_err("failed to parse pipeline config")?;
        config
            .validate()
            .wrap_err("pipeline config rejected")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.cap()?;
        if self.others_label.is_empty() {
            return Err(ChartError::invalid("others label must not be empty"));
        }
        if !self.y_axis_padding.is_finite() {
            return Err(ChartError::invalid("y axis padding must be finite"));
        }
        Ok(())
    }

    pub fn cap(&self) -> Result<Cap> {
        match self.cap {
            None => Ok(Cap::Unbounded),
            Some(n) => Cap::from_count(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = PipelineConfig::from_json(r#"{ "cap": 5 }"#).unwrap();
        assert_eq!(config.cap().unwrap(), Cap::Limit(5));
        assert_eq!(config.others_label, "Others");
        assert!(config.stacked);
        assert!(!config.full_stack_data);
    }

    #[test]
    fn test_negative_cap_rejected() {
        let err = PipelineConfig::from_json(r#"{ "cap": -1 }"#).unwrap_err();
        let cause = err.downcast_ref::<ChartError>().unwrap();
        assert!(matches!(cause, ChartError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_malformed_json_reports_context() {
        let err = PipelineConfig::from_json("{ cap: }").unwrap_err();
        assert!(err.to_string().contains("failed to parse pipeline config"));
    }
}
