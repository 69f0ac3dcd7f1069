//! `comfy-bridge status` - reconcile one run across the remote sources.

use super::{build_service, describe, print_serialized, GlobalOptions};

pub async fn show(opts: &GlobalOptions, run_id: &str) -> Result<(), String> {
    let service = build_service(opts);
    let report = service.get_run_status(run_id).await.map_err(describe)?;
    print_serialized(&report)
}
