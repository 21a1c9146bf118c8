use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tdbridge::engine::mock::ScriptedEngine;
use tdbridge::{BridgeConfig, MessagingEngine};

// The process-wide slot can only be built once per test binary, so every
// global assertion lives in this one test.
#[test]
fn process_wide_bridge_is_shared() {
    let engine = Arc::new(ScriptedEngine::new(9));
    assert!(tdbridge::global().get().is_none());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let config = BridgeConfig::default().with_poll_timeout(Duration::from_millis(20));
                tdbridge::acquire_with(config, move || engine as Arc<dyn MessagingEngine>).unwrap()
            })
        })
        .collect();
    let bridges: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(bridges.iter().all(|b| Arc::ptr_eq(b, &bridges[0])));
    assert_eq!(engine.clients_created(), 1);
    assert_eq!(tdbridge::global().send("getMe").unwrap(), 9);

    tdbridge::global().shutdown();
    tdbridge::global().shutdown();
    assert!(tdbridge::global().send("getMe").is_err());
    assert_eq!(tdbridge::global().execute("getOption"), None);
}
