use stratum_core::{PageAddress, ScopeKey};
use stratum_engine::{Engine, EngineConfig, ResolvedFrom};
use stratum_harness::{page, sections, tenant};
use stratum_storage::{ScopeStore, SqliteScopeStore};

fn file_config(path: &std::path::Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.storage.path = Some(path.to_string_lossy().into_owned());
    config
}

#[test]
fn decisions_survive_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scopes.db");
    let pinned = PageAddress::new("tenantA/issue/current")?;
    let plain = PageAddress::new("tenantB/issue/current")?;

    let digest = {
        let mut engine = Engine::open(file_config(&path))?;
        engine.propose_write(page("tenantA/issue/current")?, sections(&["mine"]))?;
        engine.propose_write(ScopeKey::Global, sections(&["global"]))?;
        engine.apply_skip()?;
        engine.store().state_digest()?
    };

    let engine = Engine::open(file_config(&path))?;
    assert_eq!(engine.store().state_digest()?, digest);
    assert_eq!(engine.resolve(&pinned)?.snapshot, sections(&["mine"]));
    assert_eq!(engine.resolve(&plain)?.source, ResolvedFrom::Stored(ScopeKey::Global));

    let global = engine.store().get(&ScopeKey::Global)?.ok_or("global missing")?;
    assert!(global.exemptions.covers_key(&page("tenantA/issue/current")?));
    Ok(())
}

#[test]
fn pending_write_is_never_persisted() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scopes.db");

    {
        let mut engine = Engine::open(file_config(&path))?;
        engine.propose_write(tenant("tenantA"), sections(&["tenant"]))?;
        engine.propose_write(page("tenantA/issue/current")?, sections(&["mine"]))?;
        engine.propose_write(tenant("tenantA"), sections(&["retemplated"]))?;
        assert!(engine.pending().is_some());
    }

    let engine = Engine::open(file_config(&path))?;
    assert!(engine.pending().is_none());
    let stored = engine.store().get(&tenant("tenantA"))?.ok_or("tenant missing")?;
    assert_eq!(stored.snapshot, sections(&["tenant"]));
    Ok(())
}

#[test]
fn config_file_drives_store_and_patterns() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("scopes.db");
    let config_path = dir.path().join("stratum.toml");
    std::fs::write(
        &config_path,
        format!(
            "[storage]\npath = '{}'\n\n[address]\ntenant_pattern = '^(?P<key>[^.]+)\\.'\n",
            db.display()
        ),
    )?;

    let config = EngineConfig::load(&config_path)?;
    let mut engine = Engine::open(config)?;
    engine.propose_write(tenant("acme"), sections(&["acme"]))?;
    assert_eq!(
        engine.resolve(&PageAddress::new("acme.example/current")?)?.snapshot,
        sections(&["acme"])
    );
    drop(engine);

    let reopened = SqliteScopeStore::open(&db.to_string_lossy())?;
    assert_eq!(reopened.entry_count()?, 1);
    Ok(())
}

#[test]
fn in_memory_when_no_path_configured() -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = Engine::open(EngineConfig::default())?;
    engine.propose_write(ScopeKey::Global, sections(&["g"]))?;
    assert_eq!(engine.store().entry_count()?, 1);
    Ok(())
}
