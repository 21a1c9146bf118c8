use tdbridge::authorization::{classify, UpdateKind};
use tdbridge::{queries, AuthStateKind, TdlibParameters};

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("tdbridge starting...");

    let bridge = match tdbridge::acquire() {
        Ok(bridge) => bridge,
        Err(e) => {
            log::error!("Failed to start bridge: {}", e);
            std::process::exit(1);
        }
    };

    // Keep TDLib's own logging out of the way
    if let Some(reply) = bridge.execute(&queries::set_log_verbosity_level(1)) {
        log::debug!("setLogVerbosityLevel: {}", reply);
    }

    let params = TdlibParameters::new(
        env_number("TDBRIDGE_API_ID"),
        std::env::var("TDBRIDGE_API_HASH").unwrap_or_default(),
    );

    let mut updates = bridge.subscribe();
    if let Err(e) = bridge.send(&queries::get_authorization_state()) {
        log::error!("Failed to query authorization state: {}", e);
    }

    while let Some(update) = updates.blocking_recv() {
        let UpdateKind::Authorization(state) = classify(&update) else {
            log::debug!("update: {}", update);
            continue;
        };

        log::info!("authorization: {}", state.type_name());
        match state {
            AuthStateKind::WaitTdlibParameters => {
                if let Err(e) = params.validate() {
                    log::error!("Cannot initialize session: {}", e);
                    break;
                }
                if let Err(e) = bridge.send(&params.to_query()) {
                    log::error!("Failed to send parameters: {}", e);
                    break;
                }
            }
            AuthStateKind::Ready | AuthStateKind::Closed => break,
            s if s.is_waiting() => {
                log::info!("Session needs interactive input; stopping here");
                break;
            }
            _ => {}
        }
    }

    log::info!("authorized: {}", bridge.is_authorized());
    bridge.shutdown();
}

fn env_number(key: &str) -> i32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
