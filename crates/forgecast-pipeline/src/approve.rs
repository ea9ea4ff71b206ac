//! Approve stage (spec section 4.6): auto-approves under the default
//! policy, or waits for an externally-recorded approval flag under the
//! manual policy (see `DESIGN.md`'s open-question resolution).

use forgecast_config::ApprovePolicy;
use forgecast_domain::{FileEntry, PipelineError, PipelineResult};

use crate::services::ExternalServices;

pub(crate) async fn run(entry: &mut FileEntry, services: &ExternalServices) -> PipelineResult<()> {
    match services.policy.approve {
        ApprovePolicy::Auto => Ok(()),
        ApprovePolicy::Manual => {
            let approved = entry
                .metadata
                .get("approval")
                .and_then(|value| value.get("approved"))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            if approved {
                Ok(())
            } else {
                Err(PipelineError::ExternalUnavailable { service: "manual_approval" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use forgecast_config::PolicySettings;
    use serde_json::json;

    use super::*;
    use crate::merge::merge_top_level;
    use crate::test_support::stub_services;

    #[tokio::test]
    async fn auto_policy_approves_immediately() {
        let mut entry = FileEntry::new("/in/movie.mkv");
        let services = stub_services(&std::env::temp_dir());
        run(&mut entry, &services).await.unwrap();
    }

    #[tokio::test]
    async fn manual_policy_waits_for_an_external_approval_flag() {
        let mut entry = FileEntry::new("/in/movie.mkv");
        let mut services = stub_services(&std::env::temp_dir());
        services.policy = PolicySettings {
            approve: forgecast_config::ApprovePolicy::Manual,
            ..PolicySettings::default()
        };

        let err = run(&mut entry, &services).await.unwrap_err();
        assert_eq!(err.kind(), forgecast_domain::ErrorKind::ExternalUnavailable);
        assert!(err.retryable());

        merge_top_level(&mut entry.metadata, json!({"approval": {"approved": true}}));
        run(&mut entry, &services).await.unwrap();
    }
}
