//! Connect to a backend, print every stream message and connection change.
//!
//! Usage: debug_stream [BASE_URL] [SECONDS]

use std::time::Duration;

use anyhow::Result;
use chatdesk_core::config::CoreConfig;
use chatdesk_core::events::CoreEvent;
use chatdesk_core::runtime::CoreRuntime;
use chatdesk_core::tracing_setup::init_tracing_with_filter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing_with_filter("chatdesk_core=debug");

    let mut args = std::env::args().skip(1);
    let mut config = CoreConfig::from_env();
    if let Some(url) = args.next() {
        config = config.with_api_base_url(url);
    }
    let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(60);

    println!("Streaming from {} for {}s", config.stream_url(), seconds);
    println!("Data dir: {}\n", config.data_dir.display());

    let mut runtime = CoreRuntime::with_http(config)?;
    let mut events = runtime.subscribe();
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Ok(CoreEvent::Message(m)) => {
                    let who = if m.is_self { "me" } else { m.sender.as_str() };
                    println!("[{}] {} <{}>: {}", m.timestamp, m.conversation_id, who, m.content);
                }
                Ok(CoreEvent::Connection(state)) => {
                    println!(
                        "-- connected={} retrying={} retry_count={} last_error={:?}",
                        state.connected, state.retrying, state.retry_count, state.last_error
                    );
                }
                Ok(CoreEvent::ConversationDeleted(id)) => println!("-- deleted {}", id),
                Err(e) => println!("-- event channel: {}", e),
            },
        }
    }

    let store = runtime.store();
    println!("\n{} conversations, {} unread", store.read(|s| s.len()), store.read(|s| s.total_unread()));
    for id in store.read(|s| s.conversation_ids_by_recency()) {
        if let Some(c) = store.conversation(&id) {
            println!("  {:<24} {:>3} msgs {:>3} unread  {}", id, c.messages.len(), c.unread_count, c.preview_snippet());
        }
    }

    runtime.shutdown().await;
    Ok(())
}
