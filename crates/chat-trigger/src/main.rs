//! `chat-listen`: follow one channel and log what the trigger sees.
//!
//! Run with:
//! ```bash
//! LISTEN_CHANNEL=chat-42 LISTEN_USER_ID=7 cargo run -p chat-trigger --bin chat-listen
//! ```
//!
//! Configuration is loaded from environment variables.

use chat_cache::{ReconnectBackoff, RedisPool, RedisRealtimeClient};
use chat_common::{
    try_init_tracing, AppConfig, AppError, AppResult, ErrorResponse, TracingConfig,
};
use chat_core::{ChannelName, DomainError, UserId};
use chat_trigger::{RealtimeTrigger, TriggerOptions};
use std::env;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing(&TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        let response = ErrorResponse::from(&e);
        error!(
            message = %response.message,
            error = %response.error,
            retryable = e.is_retryable(),
            "chat-listen failed"
        );
        std::process::exit(1);
    }
}

fn required(name: &'static str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::invalid_input(format!("{name} is required")))
}

async fn run(config: AppConfig) -> AppResult<()> {
    let channel = ChannelName::parse(&required("LISTEN_CHANNEL")?)
        .map_err(DomainError::InvalidChannelName)?;
    let user = UserId::parse(&required("LISTEN_USER_ID")?).map_err(DomainError::InvalidUserId)?;

    info!(
        env = ?config.app.env,
        channel = %channel,
        user_id = %user,
        "Starting {}",
        config.app.name
    );

    let pool = RedisPool::from_config(&config.redis).map_err(|e| AppError::Cache(e.to_string()))?;
    pool.health_check()
        .await
        .map_err(|e| AppError::Cache(e.to_string()))?;
    let client = Arc::new(RedisRealtimeClient::connect(
        pool,
        config.redis.url.clone(),
        ReconnectBackoff::from(&config.client),
    ));

    let options = TriggerOptions::new()
        .channel(Some(channel))
        .user(Some(user))
        .timings(config.trigger)
        .on_message(|envelope| {
            info!(
                channel = %envelope.channel,
                publisher = ?envelope.publisher,
                message = %envelope.message,
                "Message"
            );
        })
        .on_typing(|typing| {
            info!(user_id = %typing.user_id, is_typing = typing.is_typing, "Typing");
        });

    let trigger = RealtimeTrigger::spawn(client.clone(), options);
    let mut state = trigger.watch_state();
    let mut presence = trigger.watch_presence();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            Ok(()) = state.changed() => {
                let current = state.borrow_and_update().clone();
                info!(
                    subscribed = current.is_subscribed,
                    error = ?current.error,
                    reconnect_attempts = current.reconnect_attempts,
                    "Subscription state"
                );
            }
            Ok(()) = presence.changed() => {
                let view = presence.borrow_and_update().clone();
                for (user_id, info) in view.data.iter() {
                    info!(
                        version = view.version,
                        user_id = %user_id,
                        online = info.is_online,
                        last_seen = ?info.last_seen,
                        "Presence"
                    );
                }
            }
        }
    }

    trigger.shutdown().await.map_err(AppError::internal)?;
    client.shutdown().await?;
    Ok(())
}
