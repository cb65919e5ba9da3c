//! Hub registry under randomized concurrent use

use greenhouse_link::core::types::SensorReading;
use greenhouse_link::streaming::{Hub, Message, SessionId};
use greenhouse_link::transport::MockLink;
use parking_lot::Mutex;
use rand::prelude::*;
use rand::rngs::SmallRng;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

const WORKERS: u64 = 8;
const OPS_PER_WORKER: usize = 2000;
const SESSION_POOL: SessionId = 12;

#[test]
fn test_randomized_registry_operations() {
    let hub = Arc::new(Hub::new());
    // Every link ever registered, kept for the final checks
    let links: Arc<Mutex<Vec<MockLink>>> = Arc::new(Mutex::new(Vec::new()));

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let hub = Arc::clone(&hub);
            let links = Arc::clone(&links);
            thread::spawn(move || {
                let mut rng = SmallRng::seed_from_u64(worker + 1);
                for i in 0..OPS_PER_WORKER {
                    let session = rng.gen_range(1..=SESSION_POOL);
                    let node_id = rng.gen_range(1..=20u32);
                    match rng.gen_range(0..100) {
                        0..=19 => {
                            let link = if rng.gen_bool(0.05) {
                                MockLink::failing()
                            } else {
                                MockLink::new()
                            };
                            if hub.register(session, Arc::new(link.clone())) {
                                links.lock().push(link);
                            }
                        }
                        20..=34 => {
                            hub.deregister(session);
                        }
                        35..=49 => {
                            hub.bind_node(node_id, session);
                        }
                        50..=54 => {
                            hub.unbind_node(node_id, session);
                        }
                        55..=89 => {
                            // Unique payload per broadcast
                            let msg = Message::SensorUpdate {
                                node_id,
                                readings: vec![SensorReading::new(
                                    "seq",
                                    (worker * 1_000_000 + i as u64) as f64,
                                    "",
                                )],
                            };
                            hub.broadcast(&msg, Some(session)).unwrap();
                        }
                        _ => {
                            let msg = Message::actuator_command(node_id, 1, None, i % 2 == 0);
                            hub.send_to(node_id, &msg).unwrap();
                        }
                    }
                }
            })
        })
        .collect();

    for w in workers {
        w.join().unwrap();
    }

    // Bound nodes always belong to live sessions
    for node_id in hub.node_ids() {
        let owner = hub.owner_of(node_id).unwrap();
        assert!(hub.contains(owner), "node {} bound to dead session {}", node_id, owner);
    }

    hub.close_all();
    assert_eq!(hub.session_count(), 0);
    assert!(hub.node_ids().is_empty());

    let links = links.lock();
    assert!(!links.is_empty());
    for link in links.iter() {
        assert_eq!(link.sends_after_close(), 0);

        let sent = link.sent();
        let broadcasts: Vec<_> = sent.iter().filter(|l| l.starts_with("SENSOR:")).collect();
        let unique: HashSet<_> = broadcasts.iter().collect();
        assert_eq!(unique.len(), broadcasts.len(), "duplicate delivery");
    }
}
