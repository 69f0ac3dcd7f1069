//! `comfy-bridge run` - submit a named or inline workflow.

use comfy_bridge_core::models::{RunWorkflowRequest, WorkflowFormat};
use comfy_bridge_core::runs::{RunOutcome, RunStatus};
use tokio_util::sync::CancellationToken;

use super::{
    build_service, describe, parse_object_arg, print_serialized, read_json_file, GlobalOptions,
};

pub struct RunArgs {
    pub name: Option<String>,
    pub file: Option<String>,
    pub format: Option<String>,
    pub inputs: Option<String>,
    pub no_wait: bool,
    pub timeout_ms: Option<u64>,
    pub prompt_id: Option<String>,
    pub extra_data: Option<String>,
}

pub async fn run(opts: &GlobalOptions, args: RunArgs) -> Result<(), String> {
    let workflow = args.file.as_deref().map(read_json_file).transpose()?;
    let format = args
        .format
        .as_deref()
        .map(str::parse::<WorkflowFormat>)
        .transpose()
        .map_err(describe)?;

    let request = RunWorkflowRequest {
        workflow_name: args.name,
        workflow,
        format,
        inputs: parse_object_arg("inputs", args.inputs.as_deref())?,
        wait: !args.no_wait,
        timeout_ms: args.timeout_ms,
        prompt_id: args.prompt_id,
        extra_data: parse_object_arg("extra-data", args.extra_data.as_deref())?,
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("[CLI] Interrupted; cancelling run");
            on_interrupt.cancel();
        }
    });

    let service = build_service(opts);
    let outcome = service
        .run_workflow(request, &cancel)
        .await
        .map_err(describe)?;
    print_serialized(&outcome)?;

    match outcome {
        RunOutcome::Finished(report) if report.status == RunStatus::Failed => {
            Err(format!("Run {} failed", report.run_id))
        }
        RunOutcome::Finished(report) if report.timed_out == Some(true) => {
            tracing::warn!(
                "[CLI] Run {} did not finish within {}ms; check it later with `comfy-bridge status {}`",
                report.run_id,
                report.timeout_ms.unwrap_or_default(),
                report.run_id
            );
            Ok(())
        }
        _ => Ok(()),
    }
}
