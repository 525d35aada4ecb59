use clap::{Args, Subcommand};

use courier_channels::{mandrill, twilio, webhook};

use crate::OutputFormat;
use crate::commands::emit;

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    #[command(subcommand)]
    pub provider: Provider,
}

/// Provider report to classify.
#[derive(Subcommand, Debug)]
pub enum Provider {
    /// Twilio message status, e.g. `undelivered --error-code 30004`.
    Twilio {
        status: String,
        #[arg(long)]
        error_code: Option<String>,
    },
    /// Mandrill send status, e.g. `rejected --reject-reason hard-bounce`.
    Mandrill {
        status: String,
        #[arg(long)]
        reject_reason: Option<String>,
    },
    /// HTTP status a webhook endpoint answered with.
    Webhook {
        status_code: u16,
        #[arg(long)]
        expect_status: Option<u16>,
    },
}

pub fn run(args: &ClassifyArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let response = match &args.provider {
        Provider::Twilio { status, error_code } => twilio::interpret(status, error_code.as_deref()),
        Provider::Mandrill {
            status,
            reject_reason,
        } => mandrill::interpret(status, reject_reason.as_deref()),
        Provider::Webhook {
            status_code,
            expect_status,
        } => webhook::interpret(*status_code, *expect_status),
    };
    emit(format, &response, |response| {
        println!(
            "ok={} done={} level={} error={}",
            response.ok,
            response.done,
            response.error_level,
            response.error.as_deref().unwrap_or("-")
        );
    })
}
