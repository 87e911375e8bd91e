use std::path::Path;

use anyhow::Result;
use healthflow_spark::{ChatClient, ChatRequest, SendOptions};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::AnalyzeArgs;
use crate::output::{OutputFormat, json::print_json};
use crate::records::{AnalysisPlan, indicator, load_records, plan_indicator_analysis};
use crate::settings;

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub indicator: String,
    pub analysis: Option<String>,
    pub notice: Option<String>,
}

pub async fn run(args: AnalyzeArgs, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    if indicator(&args.indicator).is_none() {
        debug!("No metadata for indicator '{}', using the id as its name", args.indicator);
    }

    let records = settings::records_path(args.records.as_deref())
        .map(|path| load_records(&path))
        .unwrap_or_default();
    let plan = plan_indicator_analysis(&records, &args.indicator, args.user.as_deref());

    // Nothing to send: answer without touching the network or credentials.
    let report = match plan {
        AnalysisPlan::Insufficient(notice) => AnalysisReport {
            indicator: args.indicator,
            analysis: None,
            notice: Some(notice),
        },
        AnalysisPlan::Prompt(prompt) => {
            let client = settings::build_client(config)?;
            let cancel = CancellationToken::new();
            let interrupt = super::cancel_on_interrupt(cancel.clone());
            let result = analyze(&client, &args, prompt, cancel).await;
            interrupt.abort();
            result?
        }
    };

    if format.is_json() {
        return print_json(&report);
    }
    match (&report.analysis, &report.notice) {
        (Some(analysis), _) => println!("{analysis}"),
        (None, Some(notice)) => println!("{notice}"),
        (None, None) => {}
    }
    Ok(())
}

pub async fn analyze(
    client: &dyn ChatClient,
    args: &AnalyzeArgs,
    prompt: String,
    cancel: CancellationToken,
) -> Result<AnalysisReport> {
    let mut request = ChatRequest::new(prompt);
    if let Some(user) = &args.user {
        request = request.with_user_tag(user.clone());
    }
    let options = SendOptions::default().with_cancellation(cancel);
    let analysis = client.chat_with(request, options).await?;

    Ok(AnalysisReport {
        indicator: args.indicator.clone(),
        analysis: Some(analysis),
        notice: None,
    })
}
