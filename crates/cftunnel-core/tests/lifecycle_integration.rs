#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Integration tests use unwrap for brevity

//! Lifecycle manager against in-memory registry and supervisor fakes.
//!
//! Verifies the create/delete sequencing across the config store, the
//! registry and the supervisor, including the partial-failure paths.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use cftunnel_core::supervisor::{InstallOutcome, Remediation, UninstallReport};
use cftunnel_core::{
    Activation, ConfigStore, DeleteOutcome, Error, IdentityRemoval, Registry, ServiceState,
    Supervisor, TunnelManager, TunnelSpec, TunnelState, UnitSpec,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeRegistry {
    identities: RefCell<BTreeSet<String>>,
    create_calls: Cell<usize>,
    /// Succeed remotely but print nothing that looks like a credential path.
    omit_credentials: Cell<bool>,
    /// Tool missing from the host.
    missing: Cell<bool>,
    /// Delete fails with an auth-style error.
    delete_fails: Cell<bool>,
}

impl Registry for FakeRegistry {
    fn create_identity(&self, name: &str) -> cftunnel_core::Result<PathBuf> {
        self.create_calls.set(self.create_calls.get() + 1);
        if self.missing.get() {
            return Err(Error::ExternalToolMissing {
                tool: "cloudflared".into(),
            });
        }
        if !self.identities.borrow_mut().insert(name.to_string()) {
            return Err(Error::NameConflict {
                name: name.to_string(),
                message: "tunnel with name already exists".into(),
            });
        }
        if self.omit_credentials.get() {
            return Err(Error::CredentialsNotFound {
                output: format!("Created tunnel {name}"),
            });
        }
        Ok(PathBuf::from(format!("/creds/{name}.json")))
    }

    fn delete_identity(&self, name: &str) -> cftunnel_core::Result<IdentityRemoval> {
        if self.missing.get() {
            return Err(Error::ExternalToolMissing {
                tool: "cloudflared".into(),
            });
        }
        if self.delete_fails.get() {
            return Ok(IdentityRemoval::Failed("authentication failed".into()));
        }
        if self.identities.borrow_mut().remove(name) {
            Ok(IdentityRemoval::Deleted)
        } else {
            Ok(IdentityRemoval::AlreadyAbsent(format!("tunnel {name} not found")))
        }
    }
}

#[derive(Default)]
struct FakeSupervisor {
    /// unit name -> (spec, active)
    units: RefCell<BTreeMap<String, (UnitSpec, bool)>>,
    install_calls: Cell<usize>,
    deny_install: Cell<bool>,
    /// `systemctl` not installed on the host.
    missing: Cell<bool>,
}

impl Supervisor for FakeSupervisor {
    fn install(&self, unit: &UnitSpec) -> cftunnel_core::Result<InstallOutcome> {
        self.install_calls.set(self.install_calls.get() + 1);
        if self.deny_install.get() {
            return Ok(InstallOutcome::NeedsPrivilege(Remediation::new(
                &unit.name,
                PathBuf::from(format!("/etc/systemd/system/{}.service", unit.name)),
                cftunnel_core::templates::systemd_unit(unit),
            )));
        }
        self.units
            .borrow_mut()
            .insert(unit.name.clone(), (unit.clone(), true));
        Ok(InstallOutcome::Installed)
    }

    fn uninstall(&self, unit_name: &str) -> UninstallReport {
        let mut report = UninstallReport::default();
        if self.units.borrow_mut().remove(unit_name).is_none() {
            report
                .failures
                .push(format!("Failed to stop {unit_name}.service: Unit not loaded."));
        }
        report
    }

    fn is_active(&self, unit_name: &str) -> ServiceState {
        if self.missing.get() {
            return ServiceState::Unknown;
        }
        match self.units.borrow().get(unit_name) {
            Some((_, true)) => ServiceState::Active,
            _ => ServiceState::Inactive,
        }
    }

    fn set_enabled(&self, unit_name: &str, enabled: bool, _now: bool) -> cftunnel_core::Result<()> {
        let mut units = self.units.borrow_mut();
        let Some(entry) = units.get_mut(unit_name) else {
            return Err(Error::Supervisor(format!(
                "Unit {unit_name}.service does not exist."
            )));
        };
        entry.1 = enabled;
        Ok(())
    }
}

type Manager = TunnelManager<FakeRegistry, FakeSupervisor>;

fn manager() -> (tempfile::TempDir, Manager) {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::new(dir.path().join("tunnels"));
    let manager = TunnelManager::new(
        store,
        FakeRegistry::default(),
        FakeSupervisor::default(),
        "alice",
    );
    (dir, manager)
}

fn demo() -> TunnelSpec {
    TunnelSpec::new("demo", "demo.example.com", "http://localhost:3000")
}

fn confirm_yes(_: &cftunnel_core::TunnelPaths) -> cftunnel_core::Result<bool> {
    Ok(true)
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[test]
fn end_to_end_create_status_delete_recreate() {
    let (_dir, manager) = manager();

    let outcome = manager.create(&demo()).unwrap();
    assert_eq!(outcome.activation, Activation::Active);
    assert_eq!(outcome.state(), TunnelState::Active);
    assert_eq!(outcome.tunnel.unit_name, "cloudflare-tunnel-demo");
    assert_eq!(
        outcome.tunnel.credentials_path,
        PathBuf::from("/creds/demo.json")
    );

    let status = manager.status("demo").unwrap();
    assert_eq!(status.service, ServiceState::Active);

    let config = manager.view_config("demo").unwrap();
    assert!(config.contains("demo.example.com"));
    assert!(config.contains("http://localhost:3000"));

    let DeleteOutcome::Deleted(report) = manager.delete("demo", confirm_yes).unwrap() else {
        panic!("expected Deleted");
    };
    assert!(report.warnings().is_empty(), "{:?}", report.warnings());

    manager.create(&demo()).unwrap();
}

#[test]
fn create_wires_launch_script_into_unit() {
    let (_dir, manager) = manager();
    let outcome = manager.create(&demo()).unwrap();

    let units = manager.supervisor().units.borrow();
    let (unit, _) = units.get("cloudflare-tunnel-demo").unwrap();
    assert_eq!(unit.exec_path, outcome.tunnel.paths.launch_script);
    assert!(unit.exec_path.is_absolute());
    assert_eq!(unit.run_as, "alice");
    assert!(unit.description.contains("demo"));
}

#[test]
fn routing_config_has_hostname_rule_then_catch_all() {
    let (_dir, manager) = manager();
    manager
        .create(&TunnelSpec::new(
            "app",
            "app.example.com",
            "http://localhost:8000",
        ))
        .unwrap();

    let config = manager.view_config("app").unwrap();
    let lines: Vec<&str> = config.lines().collect();
    let ingress = lines.iter().position(|l| *l == "ingress:").unwrap();
    assert_eq!(lines[ingress + 1], "  - hostname: app.example.com");
    assert_eq!(lines[ingress + 2], "    service: http://localhost:8000");
    assert_eq!(lines[ingress + 3], "  - service: http_status:404");
    assert_eq!(lines.len(), ingress + 4, "catch-all must be the final rule");
}

#[test]
fn create_on_existing_directory_fails_without_side_effects() {
    let (_dir, manager) = manager();
    std::fs::create_dir_all(manager.store().root().join("demo")).unwrap();

    let err = manager.create(&demo()).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { ref name, .. } if name == "demo"));
    assert_eq!(manager.registry().create_calls.get(), 0);
    assert_eq!(manager.supervisor().install_calls.get(), 0);
    assert!(
        std::fs::read_dir(manager.store().root().join("demo"))
            .unwrap()
            .next()
            .is_none(),
        "existing directory must not be written to"
    );
}

#[test]
fn invalid_input_performs_no_writes() {
    let (_dir, manager) = manager();
    let err = manager
        .create(&TunnelSpec::new("../escape", "a.example.com", "http://localhost:1"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(!manager.store().root().exists());
    assert_eq!(manager.registry().create_calls.get(), 0);
}

#[test]
fn permission_denied_install_is_degraded_success() {
    let (_dir, manager) = manager();
    manager.supervisor().deny_install.set(true);

    let outcome = manager.create(&demo()).unwrap();
    assert_eq!(outcome.state(), TunnelState::Configured);
    let Activation::ManualStepsRequired(fix) = &outcome.activation else {
        panic!("expected manual steps, got {:?}", outcome.activation);
    };

    assert!(fix.unit_content.contains("Restart=always"));
    assert!(fix.unit_content.contains(&format!(
        "ExecStart={}",
        outcome.tunnel.paths.launch_script.display()
    )));
    assert_eq!(fix.commands.len(), 3);
    assert!(fix.commands[0].contains(&fix.unit_content));
    assert_eq!(fix.commands[1], "sudo systemctl daemon-reload");
    assert_eq!(
        fix.commands[2],
        "sudo systemctl enable --now cloudflare-tunnel-demo"
    );

    // Local artifacts are complete and readable.
    assert!(manager.view_config("demo").unwrap().contains("demo.example.com"));
    assert!(outcome.tunnel.paths.launch_script.is_file());
}

#[test]
fn registry_failure_leaves_reserved_directory_and_retry_fails_fast() {
    let (_dir, manager) = manager();
    manager.registry().missing.set(true);

    let err = manager.create(&demo()).unwrap_err();
    assert!(matches!(err, Error::ExternalToolMissing { .. }));
    let paths = manager.store().paths("demo");
    assert!(paths.dir.is_dir(), "reserved directory is not rolled back");
    assert!(!paths.config.exists());
    assert_eq!(manager.supervisor().install_calls.get(), 0);

    manager.registry().missing.set(false);
    let err = manager.create(&demo()).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { .. }));
    assert_eq!(
        manager.registry().create_calls.get(),
        1,
        "retry must not reach the registry"
    );
}

#[test]
fn missing_credentials_path_stops_before_config() {
    let (_dir, manager) = manager();
    manager.registry().omit_credentials.set(true);

    let err = manager.create(&demo()).unwrap_err();
    assert!(matches!(err, Error::CredentialsNotFound { .. }));
    assert!(!manager.store().paths("demo").config.exists());
    assert_eq!(manager.supervisor().install_calls.get(), 0);
    // The remote identity was created and is not cleaned up automatically.
    assert!(manager.registry().identities.borrow().contains("demo"));
}

#[test]
fn registry_name_conflict_is_reported() {
    let (_dir, manager) = manager();
    manager
        .registry()
        .identities
        .borrow_mut()
        .insert("demo".into());

    let err = manager.create(&demo()).unwrap_err();
    assert!(matches!(err, Error::NameConflict { .. }));
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[test]
fn create_then_delete_returns_to_absent() {
    let (_dir, manager) = manager();
    manager.create(&demo()).unwrap();

    manager.delete("demo", confirm_yes).unwrap();

    assert!(!manager.store().exists("demo"));
    assert!(manager.supervisor().units.borrow().is_empty());
    assert!(manager.registry().identities.borrow().is_empty());
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn delete_twice_reports_not_found_gracefully() {
    let (_dir, manager) = manager();
    manager.create(&demo()).unwrap();

    assert!(matches!(
        manager.delete("demo", confirm_yes).unwrap(),
        DeleteOutcome::Deleted(_)
    ));
    assert_eq!(
        manager.delete("demo", confirm_yes).unwrap(),
        DeleteOutcome::NotFound
    );
}

#[test]
fn declined_confirmation_touches_nothing() {
    let (_dir, manager) = manager();
    manager.create(&demo()).unwrap();

    let outcome = manager
        .delete("demo", |_| Ok::<_, Error>(false))
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::Cancelled);
    assert!(manager.store().exists("demo"));
    assert_eq!(manager.status("demo").unwrap().service, ServiceState::Active);
    assert!(manager.registry().identities.borrow().contains("demo"));
}

#[test]
fn confirm_error_propagates_before_teardown() {
    let (_dir, manager) = manager();
    manager.create(&demo()).unwrap();

    let err = manager
        .delete("demo", |_| Err(Error::InvalidInput("prompt closed".into())))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(manager.store().exists("demo"));
}

#[test]
fn delete_continues_past_soft_failures() {
    let (_dir, manager) = manager();
    manager.supervisor().deny_install.set(true);
    manager.create(&demo()).unwrap();
    manager.registry().delete_fails.set(true);

    let DeleteOutcome::Deleted(report) = manager.delete("demo", confirm_yes).unwrap() else {
        panic!("expected Deleted");
    };

    // Unit was never installed and the registry refused: both soft.
    assert_eq!(report.service_failures.len(), 1);
    assert_eq!(
        report.identity,
        IdentityRemoval::Failed("authentication failed".into())
    );
    assert_eq!(report.warnings().len(), 2);
    assert!(!manager.store().exists("demo"));
}

#[test]
fn delete_with_registry_tool_missing_still_removes_directory() {
    let (_dir, manager) = manager();
    manager.create(&demo()).unwrap();
    manager.registry().missing.set(true);

    let DeleteOutcome::Deleted(report) = manager.delete("demo", confirm_yes).unwrap() else {
        panic!("expected Deleted");
    };
    assert!(matches!(report.identity, IdentityRemoval::Failed(ref m) if m.contains("cloudflared")));
    assert!(!manager.store().exists("demo"));
}

#[test]
fn delete_rejects_path_traversal() {
    let (dir, manager) = manager();
    std::fs::create_dir_all(dir.path().join("precious")).unwrap();

    let err = manager.delete("../precious", confirm_yes).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(dir.path().join("precious").is_dir());
}

#[test]
fn tunnel_with_legacy_name_can_be_inspected_and_deleted() {
    let (dir, manager) = manager();
    let legacy = dir.path().join("tunnels/My Tunnel");
    std::fs::create_dir_all(&legacy).unwrap();
    std::fs::write(legacy.join("config.yml"), "tunnel: My Tunnel\n").unwrap();

    assert!(manager.list().unwrap().contains("My Tunnel"));
    assert_eq!(
        manager.status("My Tunnel").unwrap().unit_name,
        "cloudflare-tunnel-My Tunnel"
    );
    assert_eq!(
        manager.view_config("My Tunnel").unwrap(),
        "tunnel: My Tunnel\n"
    );

    let outcome = manager.delete("My Tunnel", confirm_yes).unwrap();
    assert!(matches!(outcome, DeleteOutcome::Deleted(_)));
    assert!(!legacy.exists());
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn legacy_names_are_still_rejected_at_create() {
    let (dir, manager) = manager();
    let err = manager
        .create(&TunnelSpec::new(
            "My Tunnel",
            "demo.example.com",
            "http://localhost:3000",
        ))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(!dir.path().join("tunnels").exists());
}

// ---------------------------------------------------------------------------
// Status / activate / deactivate / config
// ---------------------------------------------------------------------------

#[test]
fn activate_and_deactivate_toggle_service() {
    let (_dir, manager) = manager();
    manager.create(&demo()).unwrap();

    manager.deactivate("demo").unwrap();
    assert_eq!(manager.status("demo").unwrap().service, ServiceState::Inactive);

    manager.activate("demo").unwrap();
    assert_eq!(manager.status("demo").unwrap().service, ServiceState::Active);
}

#[test]
fn supervisor_error_is_reported_verbatim() {
    let (_dir, manager) = manager();
    manager.supervisor().deny_install.set(true);
    manager.create(&demo()).unwrap();

    let err = manager.activate("demo").unwrap_err();
    assert_eq!(
        err.to_string(),
        "service supervisor error: Unit cloudflare-tunnel-demo.service does not exist."
    );
}

#[test]
fn status_is_unknown_when_supervisor_missing() {
    let (_dir, manager) = manager();
    manager.create(&demo()).unwrap();
    manager.supervisor().missing.set(true);

    assert_eq!(manager.status("demo").unwrap().service, ServiceState::Unknown);
}

#[test]
fn operations_on_missing_tunnel_are_not_found() {
    let (_dir, manager) = manager();
    assert!(matches!(manager.status("ghost"), Err(Error::NotFound { .. })));
    assert!(matches!(manager.activate("ghost"), Err(Error::NotFound { .. })));
    assert!(matches!(manager.deactivate("ghost"), Err(Error::NotFound { .. })));
    assert!(matches!(manager.view_config("ghost"), Err(Error::NotFound { .. })));
}

#[test]
fn overview_lists_every_tunnel_with_state() {
    let (_dir, manager) = manager();
    manager.create(&demo()).unwrap();
    manager
        .create(&TunnelSpec::new("api", "api.example.com", "http://localhost:9000"))
        .unwrap();
    manager.deactivate("api").unwrap();

    let overview = manager.overview().unwrap();
    let states: Vec<_> = overview
        .iter()
        .map(|s| (s.name.as_str(), s.service))
        .collect();
    assert_eq!(
        states,
        vec![("api", ServiceState::Inactive), ("demo", ServiceState::Active)]
    );
}

#[test]
fn with_store_switches_base_directory() {
    let (dir, manager) = manager();
    manager.create(&demo()).unwrap();

    let manager = manager.with_store(ConfigStore::new(dir.path().join("elsewhere")));
    assert!(manager.list().unwrap().is_empty());
    manager
        .create(&TunnelSpec::new("other", "o.example.com", "http://localhost:1"))
        .unwrap();
    assert!(dir.path().join("elsewhere/other/config.yml").is_file());
}
