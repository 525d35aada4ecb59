use clap::Args;

use courier_config::ResolveContext;
use courier_core::EntityRef;
use courier_gateway::Dispatcher;

use crate::OutputFormat;
use crate::commands::emit;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Entity as `type:id`.
    pub entity: EntityRef,
    /// Show only the entity's own document, without inheritance.
    #[arg(long)]
    pub own: bool,
}

pub async fn run(
    dispatcher: &Dispatcher,
    args: &ResolveArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let store = dispatcher.config();
    let config = if args.own {
        store.resolve_own(&args.entity).await?
    } else {
        store
            .resolve(&args.entity, &ResolveContext::new())
            .await?
            .config
    };
    emit(format, &config, |config| {
        println!("{}:", args.entity);
        println!(
            "{}",
            serde_json::to_string_pretty(config).unwrap_or_else(|_| config.to_string())
        );
    })
}
