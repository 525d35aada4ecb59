use std::collections::BTreeMap;

use anyhow::bail;
use clap::Args;
use serde_json::{Value, json};

use courier_core::{EntityRef, Message, TransportConfig};
use courier_gateway::Dispatcher;
use courier_queue::WorkerPool;

use crate::OutputFormat;
use crate::commands::{emit, json_arg};

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Event name.
    pub event: String,
    /// Event data as JSON (string or @file path).
    #[arg(long, default_value = "{}")]
    pub data: String,
    /// Recipient as `type:id`. Repeatable; replaces `recipients` in the data.
    #[arg(long = "recipient")]
    pub recipients: Vec<EntityRef>,
    /// Enqueue the messages and deliver them to the log instead of only
    /// printing them.
    #[arg(long)]
    pub send: bool,
}

pub async fn run(
    dispatcher: &Dispatcher,
    args: &RouteArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let data = with_recipients(json_arg(&args.data)?, &args.recipients)?;

    if !args.send {
        let report = dispatcher.preview(&args.event, &data).await?;
        return emit(format, &report, |report| {
            for message in &report.messages {
                println!("{}", describe(message));
            }
            println!(
                "{} message(s) for {} recipient(s); skipped {}, gated {}, dropped {}",
                report.messages.len(),
                report.recipients,
                report.skipped,
                report.gated,
                report.dropped
            );
        });
    }

    let report = dispatcher.send(&args.event, &data).await?;
    let pool = WorkerPool::new(dispatcher.queue().clone());
    loop {
        let started = pool.run_once().await?;
        pool.wait_idle().await;
        if started == 0 {
            break;
        }
    }
    let counts: BTreeMap<&str, usize> = dispatcher
        .queue()
        .counts()
        .await?
        .into_iter()
        .map(|(status, count)| (status.as_str(), count))
        .collect();

    let output = json!({ "report": report, "jobs": counts });
    emit(format, &output, |_| {
        println!(
            "enqueued {} job(s), {} refused; skipped {}, gated {}, dropped {}",
            report.jobs.len(),
            report.failed,
            report.skipped,
            report.gated,
            report.dropped
        );
        for (status, count) in &counts {
            println!("  {status}: {count}");
        }
    })
}

/// Put `recipients` into the event data as `type:id` strings.
fn with_recipients(mut data: Value, recipients: &[EntityRef]) -> anyhow::Result<Value> {
    if recipients.is_empty() {
        return Ok(data);
    }
    let Some(object) = data.as_object_mut() else {
        bail!("--data must be a JSON object when --recipient is given");
    };
    object.insert(
        "recipients".to_owned(),
        recipients.iter().map(|r| Value::String(r.to_string())).collect(),
    );
    Ok(data)
}

fn describe(message: &Message) -> String {
    let target = match &message.transport {
        TransportConfig::Email { to } | TransportConfig::Sms { to, .. } => to.clone(),
        TransportConfig::Push { user_id, .. } => user_id.clone(),
        TransportConfig::Webhook { url, method, .. } => {
            let verb = format!("{method:?}").to_uppercase();
            format!("{verb} {url}")
        }
        TransportConfig::Custom { .. } => "custom".to_owned(),
    };
    let recipient = message
        .recipient
        .as_ref()
        .map_or_else(|| "-".to_owned(), ToString::to_string);
    format!(
        "[{}] {recipient} -> {target} subject={:?} body={:?}",
        message.channel, message.subject_template, message.body_template
    )
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    #[test]
    fn recipients_replace_data_list() {
        let data = with_recipients(
            json!({"recipients": ["user:9"], "order": 5}),
            &[EntityRef::new("user", "1"), EntityRef::new("team", "a")],
        )
        .unwrap();
        assert_eq!(data, json!({"recipients": ["user:1", "team:a"], "order": 5}));

        let untouched = with_recipients(json!([1, 2]), &[]).unwrap();
        assert_eq!(untouched, json!([1, 2]));
        assert!(with_recipients(json!([1, 2]), &[EntityRef::new("user", "1")]).is_err());
    }

    #[test]
    fn describes_email() {
        let message = Message {
            channel: "email".into(),
            subject_template: "Hi".into(),
            body_template: "welcome".into(),
            transport: TransportConfig::Email {
                to: "one@example.com".into(),
            },
            delay_ms: 0,
            timeout_ms: 0,
            template_data: Map::new(),
            recipient: Some(EntityRef::new("user", "1")),
        };
        assert_eq!(
            describe(&message),
            r#"[email] user:1 -> one@example.com subject="Hi" body="welcome""#
        );
    }

    #[tokio::test]
    async fn send_delivers_through_log_worker() {
        let dispatcher = crate::app::tests::welcome_stack().await;
        let args = RouteArgs {
            event: "welcome".into(),
            data: "{}".into(),
            recipients: vec![EntityRef::new("user", "1")],
            send: true,
        };
        run(&dispatcher, &args, &OutputFormat::Json).await.unwrap();
        let completed = dispatcher
            .queue()
            .jobs(Some(courier_queue::JobStatus::Completed))
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        dispatcher.shutdown().await;
    }
}
