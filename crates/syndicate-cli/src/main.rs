use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::{Duration, sleep};

use syndicate_core::workflow::step;
use syndicate_core::{
    Channel, ChannelKind, ConsolePlatform, Engine, EngineError, IdGenerator, JobRecord, JobType,
    PlatformClient, PostId, Priority, Step, StepOutcome, SystemClock, UlidGenerator,
};

#[derive(Debug, Deserialize)]
struct PublishPayload {
    #[serde(rename = "postId")]
    post_id: String,
}

/// Pick the post out of the payload and confirm it exists.
struct SelectStep;

#[async_trait]
impl Step for SelectStep {
    async fn run(
        &self,
        _job: &JobRecord,
        payload: &serde_json::Value,
    ) -> Result<StepOutcome, String> {
        let p: PublishPayload =
            serde_json::from_value(payload.clone()).map_err(|e| format!("json decode: {e}"))?;
        Ok(StepOutcome::advance(
            serde_json::json!({"selected": p.post_id}),
            "validate",
        ))
    }
}

/// Content checks before anything leaves the building.
struct ValidateStep;

#[async_trait]
impl Step for ValidateStep {
    async fn run(
        &self,
        _job: &JobRecord,
        payload: &serde_json::Value,
    ) -> Result<StepOutcome, String> {
        if payload.get("selected").is_none() {
            return Err("nothing selected to validate".to_string());
        }
        Ok(StepOutcome::advance(
            serde_json::json!({"validated": true}),
            "publish",
        ))
    }
}

struct PublishStep;

#[async_trait]
impl Step for PublishStep {
    async fn run(
        &self,
        _job: &JobRecord,
        payload: &serde_json::Value,
    ) -> Result<StepOutcome, String> {
        let post = payload["selected"].as_str().unwrap_or("?");
        println!("publishing {post}");
        Ok(StepOutcome::advance(
            serde_json::json!({"publishedAt": "now"}),
            "notify",
        ))
    }
}

struct NotifyStep;

#[async_trait]
impl Step for NotifyStep {
    async fn run(
        &self,
        _job: &JobRecord,
        _payload: &serde_json::Value,
    ) -> Result<StepOutcome, String> {
        Ok(StepOutcome::done())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // (A) wire the engine: workflow, channels, platform adapter
    let platform = Arc::new(ConsolePlatform::new());
    let ids = UlidGenerator::new(Arc::new(SystemClock));
    let portal = ids.generate_channel_id();
    let mirror = ids.generate_channel_id();

    let engine = Engine::builder()
        .workflow(
            JobType::new("blog-autopublish"),
            vec![
                step("select", SelectStep),
                step("validate", ValidateStep),
                step("publish", PublishStep),
                step("notify", NotifyStep),
            ],
        )?
        .expect_workflows(&["blog-autopublish"])
        .channel(Channel::new(portal, "Dev Portal", ChannelKind::new("console")))
        .channel(Channel::new(mirror, "Mirror", ChannelKind::new("console")))
        .platform(
            ChannelKind::new("console"),
            Arc::clone(&platform) as Arc<dyn PlatformClient>,
        )
        .build()?;
    let engine = Arc::new(engine);

    // (B) start workers
    let workers = engine.spawn_workers(2);

    // (C) enqueue a job, and show the duplicate being rejected as a conflict
    let job = engine
        .enqueue_job(
            JobType::new("blog-autopublish"),
            serde_json::json!({"postId": "p1"}),
            Priority::Normal,
        )
        .await?;
    println!("enqueued job: {}", job.id);

    match engine
        .enqueue_job(
            JobType::new("blog-autopublish"),
            serde_json::json!({"postId": "p1"}),
            Priority::Normal,
        )
        .await
    {
        Err(EngineError::DuplicateJob { existing }) => {
            println!("duplicate rejected, already in progress as {existing}");
        }
        other => println!("unexpected: {other:?}"),
    }

    // (D) wait for the workflow to finish
    loop {
        let st = engine.get_job(job.id).await?;
        if st.status.is_terminal() {
            println!(
                "final job status: status={} step={:?} attempts={}",
                st.status,
                st.step.as_ref().map(|s| s.as_str()),
                st.attempts
            );
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    // (E) distribute the post to both channels and drain
    let created = engine
        .bulk_distribute(&[PostId::new("p1")], &[portal, mirror])
        .await?;
    println!("scheduled {} distributions", created.len());

    let delivered = engine.run_pending_distributions().await?;
    for record in &delivered {
        println!(
            "distribution {}: status={} external_ref={:?}",
            record.id,
            record.status,
            record.external_ref.as_ref().map(|r| r.as_str())
        );
    }

    // (F) per-channel health snapshot
    for (channel_id, health) in engine.health_check().await {
        println!(
            "health {}: breaker={:?} failures={} tokens={:.1}",
            channel_id, health.breaker_state, health.consecutive_failures, health.tokens_available
        );
    }

    workers.shutdown_and_join().await;
    tracing::info!("workers stopped");
    Ok(())
}
