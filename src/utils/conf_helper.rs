use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;

use crate::core::error::{PimsError, Result};
use crate::models::config_model::JobConfig;

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path)
        .await
        .map_err(|e| PimsError::Config(format!("File read Error: {e} {}", path.display())))?;

    serde_json::from_str(&data)
        .map_err(|e| PimsError::Config(format!("JSON Parse Error in {}: {e}", path.display())))
}

pub async fn load_job_config(path: &Path) -> Result<JobConfig> {
    let mut job: JobConfig = read_json(path).await?;
    job.client.retry = job.client.retry.normalized();
    job.validate()?;
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pims_sync_{}_{}.json", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_load_job_config() {
        let path = scratch("job");
        fs::write(
            &path,
            r#"{
                "client": {"server": "pims01", "retry": {"max_attempts": 0}},
                "tags": [{"tag": "TI-100"}],
                "window": {"start": "2022-06-20T00:00:00", "stop": "2022-06-20T01:00:00"}
            }"#,
        )
        .await
        .unwrap();

        let job = load_job_config(&path).await.unwrap();
        assert_eq!(job.client.retry.max_attempts, 1);
        fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_and_bad_json() {
        let missing = scratch("missing");
        assert!(matches!(
            load_job_config(&missing).await,
            Err(PimsError::Config(msg)) if msg.contains("File read Error")
        ));

        let bad = scratch("bad");
        fs::write(&bad, "{ not json").await.unwrap();
        assert!(matches!(
            load_job_config(&bad).await,
            Err(PimsError::Config(msg)) if msg.contains("JSON Parse Error")
        ));
        fs::remove_file(&bad).await.unwrap();
    }
}
