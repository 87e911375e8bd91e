use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use healthflow_spark::{ChatClient, ChatRequest, SendOptions};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::ChatArgs;
use crate::output::{OutputFormat, json::print_json};
use crate::records::{build_health_context, load_records};
use crate::settings;

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub model: String,
    pub user: Option<String>,
    pub reply: String,
}

pub async fn run(args: ChatArgs, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    let client = settings::build_client(config)?;
    let request = build_request(&args);

    let cancel = CancellationToken::new();
    let interrupt = super::cancel_on_interrupt(cancel.clone());
    let mut options = SendOptions::default().with_cancellation(cancel);

    let streaming = args.stream && !format.is_json();
    if streaming {
        options = options.with_observer(Arc::new(|delta: &str| {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }));
    }

    let result = ask(&client, request, options).await;
    interrupt.abort();
    if streaming {
        println!();
    }
    let reply = result?;

    if format.is_json() {
        print_json(&reply)
    } else {
        if !streaming {
            println!("{}", reply.reply);
        }
        Ok(())
    }
}

/// Build the request, folding the user's recent records into the context.
pub fn build_request(args: &ChatArgs) -> ChatRequest {
    let mut request = ChatRequest::new(args.message.clone());

    let health = match args.user.as_deref() {
        Some(user) => match settings::records_path(args.records.as_deref()) {
            Some(path) => build_health_context(&load_records(&path), Some(user)),
            None => String::new(),
        },
        None => String::new(),
    };

    let context: Vec<&str> = [args.context.as_deref().unwrap_or_default(), health.as_str()]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect();
    if !context.is_empty() {
        request = request.with_context(context.join("\n"));
    }
    if let Some(user) = &args.user {
        request = request.with_user_tag(user.clone());
    }
    request
}

pub async fn ask(
    client: &dyn ChatClient,
    request: ChatRequest,
    options: SendOptions,
) -> Result<ChatReply> {
    let user = request.user_tag.clone();
    debug!("Sending chat to {}", client.model());
    let reply = client.chat_with(request, options).await?;
    Ok(ChatReply {
        model: client.model().to_string(),
        user,
        reply,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::RecordingClient;

    fn write_records(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("records.json");
        std::fs::write(
            &path,
            r#"{ "records": [
                { "username": "alice", "createdAt": "2026-05-01T08:00:00Z", "heartRate": 74 },
                { "username": "bob", "createdAt": "2026-05-01T09:00:00Z", "weight": 80 }
            ] }"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_request_includes_user_records() {
        let dir = tempfile::tempdir().unwrap();
        let args = ChatArgs {
            message: "我的心率正常吗？".into(),
            user: Some("alice".into()),
            records: Some(write_records(dir.path())),
            ..ChatArgs::default()
        };

        let request = build_request(&args);
        assert_eq!(request.user_tag.as_deref(), Some("alice"));
        let context = request.context.unwrap();
        assert!(context.contains("心率: 74"));
        assert!(!context.contains("体重"));
    }

    #[test]
    fn test_explicit_context_comes_first() {
        let dir = tempfile::tempdir().unwrap();
        let args = ChatArgs {
            message: "hi".into(),
            user: Some("alice".into()),
            context: Some("age 42".into()),
            records: Some(write_records(dir.path())),
            ..ChatArgs::default()
        };

        let context = build_request(&args).context.unwrap();
        assert!(context.starts_with("age 42\n用户最近的健康数据："));
    }

    #[test]
    fn test_anonymous_request_has_no_context() {
        let args = ChatArgs {
            message: "hi".into(),
            ..ChatArgs::default()
        };
        let request = build_request(&args);
        assert!(request.user_tag.is_none());
        assert!(request.context.is_none());
    }

    #[tokio::test]
    async fn test_ask_returns_model_and_reply() {
        let client = RecordingClient::replying("多喝水");
        let reply = ask(
            &client,
            ChatRequest::new("hi").with_user_tag("alice"),
            SendOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(reply.model, "lite");
        assert_eq!(reply.user.as_deref(), Some("alice"));
        assert_eq!(reply.reply, "多喝水");
        assert_eq!(client.requests()[0].message, "hi");
    }

    #[tokio::test]
    async fn test_ask_propagates_client_error() {
        let client = RecordingClient::failing();
        let err = ask(&client, ChatRequest::new("hi"), SendOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Deadline"));
    }
}
