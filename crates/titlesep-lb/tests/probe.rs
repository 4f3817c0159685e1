use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use titlesep_core::{EndpointConfig, EndpointKind};
use titlesep_lb::{
    fallback_order, probe_primary, EndpointId, EndpointRegistry, HealthCheckConfig,
    LivenessProbe,
};

enum Behaviour {
    Up,
    Down,
    Hang,
}

struct FakeProbe {
    behaviour: Behaviour,
    checked: Mutex<Vec<String>>,
}

impl FakeProbe {
    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            checked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LivenessProbe for FakeProbe {
    async fn check(&self, url: &str, _timeout: Duration) -> bool {
        self.checked.lock().push(url.to_string());
        match self.behaviour {
            Behaviour::Up => true,
            Behaviour::Down => false,
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                true
            }
        }
    }
}

fn registry(health: Option<&str>) -> EndpointRegistry {
    EndpointRegistry::from_config(&[
        EndpointConfig {
            name: "ecf".into(),
            kind: EndpointKind::Direct,
            base: "https://rating.example.org/v2/new/api.php".into(),
            health_check_path: health.map(str::to_string),
        },
        EndpointConfig {
            name: "relay".into(),
            kind: EndpointKind::Relay,
            base: "https://relay.example.com/?url=".into(),
            health_check_path: None,
        },
        EndpointConfig {
            name: "raw".into(),
            kind: EndpointKind::Relay,
            base: "https://raw.example.net/raw?url=".into(),
            health_check_path: None,
        },
    ])
    .unwrap()
}

#[test]
fn healthy_primary_stays_selected() {
    let registry = registry(Some("/"));
    let probe = FakeProbe::new(Behaviour::Up);

    let ok = tokio_test::block_on(probe_primary(&registry, &probe, &HealthCheckConfig::default()));

    assert!(ok);
    assert_eq!(probe.checked.lock().as_slice(), ["https://rating.example.org/"]);
    assert!(registry.primary_reachable());
    assert_eq!(registry.select(), EndpointId(0));
}

#[test]
fn failed_probe_moves_selection_to_first_relay() {
    let registry = registry(Some("/"));
    let probe = FakeProbe::new(Behaviour::Down);

    let ok = tokio_test::block_on(probe_primary(&registry, &probe, &HealthCheckConfig::default()));

    assert!(!ok);
    assert!(!registry.primary_reachable());
    assert_eq!(registry.select(), EndpointId(1));
}

#[tokio::test(start_paused = true)]
async fn hanging_probe_times_out() {
    let registry = registry(Some("/"));
    let probe = FakeProbe::new(Behaviour::Hang);
    let cfg = HealthCheckConfig {
        timeout: Duration::from_secs(5),
    };

    assert!(!probe_primary(&registry, &probe, &cfg).await);
    assert!(!registry.primary_reachable());
}

#[test]
fn primary_without_health_path_is_trusted() {
    let registry = registry(None);
    let probe = FakeProbe::new(Behaviour::Down);

    assert!(tokio_test::block_on(probe_primary(
        &registry,
        &probe,
        &HealthCheckConfig::default()
    )));
    assert!(probe.checked.lock().is_empty());
}

#[test]
fn fallback_skips_only_the_failed_endpoint() {
    let registry = registry(None);
    assert_eq!(
        fallback_order(registry.pool(), EndpointId(0)),
        vec![EndpointId(1), EndpointId(2)]
    );
    assert_eq!(
        fallback_order(registry.pool(), EndpointId(1)),
        vec![EndpointId(0), EndpointId(2)]
    );
}

#[test]
fn fallback_pin_survives_unrelated_failures() {
    let registry = registry(None);
    registry.pin(EndpointId(2));
    registry.unpin_if(EndpointId(1));
    assert_eq!(registry.select(), EndpointId(2));
    registry.unpin_if(EndpointId(2));
    assert_eq!(registry.pinned(), None);
}
