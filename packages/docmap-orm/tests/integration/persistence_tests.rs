//! Sessions over snapshot-backed databases.

use std::fs;
use std::sync::Arc;

use ntest::timeout;
use tempfile::tempdir;

use docmap_orm::{DocmapConfig, Session};
use docmap_store::Database;

use super::helpers::entity_maps;

fn session_for(db: Arc<Database>, config: &DocmapConfig) -> anyhow::Result<Session> {
    let mut builder = Session::builder(db).config(config.mapper.clone());
    for map in entity_maps() {
        builder = builder.register(map);
    }
    Ok(builder.build()?)
}

#[timeout(2000)]
#[test]
fn test_relations_survive_restart() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("docmap.toml");
    fs::write(
        &config_path,
        format!(
            "[store]\ndatabase = \"restart_test\"\ndata_dir = {:?}\n\n[mapper]\nstrict_mode = true\n",
            temp_dir.path().join("data").display().to_string()
        ),
    )?;
    let config = DocmapConfig::from_file(&config_path)?;
    assert!(config.mapper.strict_mode);

    let (user_id, role_ids) = {
        let db = Arc::new(Database::connect(config.store.clone())?);
        let session = session_for(db.clone(), &config)?;

        let mut user = session.make("User")?;
        user.set("email", "restart@example.com");
        for name in ["Role A", "Role B"] {
            let mut role = session.make("Role")?;
            role.set("name", name);
            user.related_mut("roles")?.push(role);
        }
        session.store(&mut user)?;
        db.flush()?;

        let role_ids = user.related_mut("roles")?.ids();
        (user.id().cloned().unwrap(), role_ids)
    };

    let db = Arc::new(Database::connect(config.store.clone())?);
    let session = session_for(db.clone(), &config)?;
    let mut user = session.mapper("User")?.find(&user_id)?;
    assert_eq!(user.get("email").and_then(|v| v.as_str()), Some("restart@example.com"));

    let roles = user.related_mut("roles")?;
    assert_eq!(roles.ids(), role_ids);
    let names: Vec<_> = roles
        .iter()
        .filter_map(|r| r.get("name").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(names, vec!["Role A", "Role B"]);
    Ok(())
}
