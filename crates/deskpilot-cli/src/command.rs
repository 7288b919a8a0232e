use crate::cli::{
    ActionArg, CaptureArgs, DelayArgs, ImportTemplateArgs, KindArg, ResourceCommand, ResourcesArgs,
};
use anyhow::{Context, Result};
use deskpilot::step::DEFAULT_IMAGE_THRESHOLD;
use deskpilot::{AgentService, ControlDescriptor, FlowAction, ImageTemplate, ResourceKind};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

impl From<ActionArg> for FlowAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Open => FlowAction::Open,
            ActionArg::Close => FlowAction::Close,
        }
    }
}

impl From<KindArg> for ResourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Control => ResourceKind::Control,
            KindArg::Image => ResourceKind::Image,
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

fn capture_timeout(args: &CaptureArgs) -> Option<Duration> {
    args.timeout.map(Duration::from_secs)
}

/// Returns whether the flow succeeded.
pub async fn handle_run(service: &AgentService, app: &str, action: ActionArg) -> Result<bool> {
    let result = service.execute(app, action.into()).await;
    print_json(&result)?;
    Ok(result.success)
}

pub async fn handle_capture_control(service: &AgentService, args: &CaptureArgs) -> Result<()> {
    let captured = service
        .start_control_capture(capture_timeout(args))
        .await
        .context("control capture failed")?;
    match &captured {
        Some(descriptor) => info!("captured {}", descriptor.summary()),
        None => info!("nothing captured"),
    }
    print_json(&json!({ "control": captured }))
}

pub async fn handle_capture_region(service: &AgentService, args: &CaptureArgs) -> Result<()> {
    let saved = service
        .start_region_capture(capture_timeout(args))
        .await
        .context("region capture failed")?;
    print_json(&json!({ "image": saved }))
}

pub async fn handle_capture_window(service: &AgentService, args: &DelayArgs) -> Result<()> {
    info!("capturing the focused window in {}s", args.delay);
    let saved = service
        .capture_window(Duration::from_secs(args.delay))
        .await
        .context("window capture failed")?;
    print_json(&json!({ "image": saved }))
}

pub async fn handle_pick_control(service: &AgentService, args: &DelayArgs) -> Result<()> {
    info!("reading the control under the pointer in {}s", args.delay);
    tokio::time::sleep(Duration::from_secs(args.delay)).await;
    let picked = service
        .pick_control_at_cursor()
        .await
        .context("control picking failed")?;
    print_json(&json!({ "control": picked }))
}

pub fn handle_import_template(service: &AgentService, args: &ImportTemplateArgs) -> Result<()> {
    let name = service
        .import_template(&args.file, args.name.as_deref())
        .with_context(|| format!("failed to import {}", args.file.display()))?;
    print_json(&json!({ "image": name }))
}

pub async fn handle_locate(
    service: &AgentService,
    app: &str,
    kind: KindArg,
    id: &str,
) -> Result<()> {
    let response = service
        .locate(app, kind.into(), id)
        .await
        .with_context(|| format!("failed to locate {id} in {app}"))?;
    print_json(&response)?;
    if response.matched {
        // Leave the highlight on screen for its full duration.
        tokio::time::sleep(Duration::from_millis(2500)).await;
    }
    Ok(())
}

pub fn handle_resources(service: &AgentService, args: ResourcesArgs) -> Result<()> {
    let app = args.app.as_str();
    match args.command {
        ResourceCommand::List => {
            let library = service
                .resources(app)
                .with_context(|| format!("failed to load resources for {app}"))?;
            print_json(&library)
        }
        ResourceCommand::AddControl { name, descriptor } => {
            let payload: ControlDescriptor = serde_json::from_str(&descriptor)
                .context("descriptor must be a JSON control descriptor")?;
            let item = service.create_control(app, &name, payload)?;
            print_json(&item)
        }
        ResourceCommand::AddImage {
            name,
            image,
            threshold,
        } => {
            let payload = ImageTemplate {
                image,
                threshold: threshold.unwrap_or(DEFAULT_IMAGE_THRESHOLD),
            };
            let item = service.create_image(app, &name, payload)?;
            print_json(&item)
        }
        ResourceCommand::Rename { kind, id, name } => {
            service.rename_resource(app, kind.into(), &id, &name)?;
            print_json(&json!({ "renamed": true, "resource_id": id }))
        }
        ResourceCommand::Delete { kind, id } => {
            service.delete_resource(app, kind.into(), &id)?;
            print_json(&json!({ "deleted": true, "resource_id": id }))
        }
    }
}
