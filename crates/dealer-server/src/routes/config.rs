use axum::extract::State;
use axum::Json;
use dealer_core::config::ConfigWarning;

use crate::error::AppError;
use crate::routes::blocking;
use crate::state::AppState;

/// GET /api/config: the effective `dealer.yaml` (environment overrides
/// applied) and its validation warnings. Read-only.
pub async fn get_config(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let result = blocking(move || {
        let config = app.config()?;
        let warnings: Vec<ConfigWarning> = config.validate();
        Ok(serde_json::json!({
            "config": serde_json::to_value(&config)?,
            "warnings": serde_json::to_value(&warnings)?,
        }))
    })
    .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealer_core::config::Config;

    #[tokio::test]
    async fn missing_config_reports_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = AppState::new(dir.path().to_path_buf());
        let json = get_config(State(app)).await.unwrap().0;
        assert_eq!(json["config"]["prompt"]["aged_days"], 60);
        assert!(json["warnings"].is_array());
    }

    #[tokio::test]
    async fn saved_config_is_returned() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.bounds.max_adjustment = 0.1;
        config.save(dir.path()).unwrap();

        let app = AppState::new(dir.path().to_path_buf());
        let json = get_config(State(app)).await.unwrap().0;
        assert_eq!(json["config"]["bounds"]["max_adjustment"], 0.1);
    }
}
