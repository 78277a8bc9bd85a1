use std::path::PathBuf;

use oda_core::config;

use crate::prompt;

pub(crate) fn run_config_generate(dest: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let path = match dest {
        Some(d) => PathBuf::from(d),
        None => pick_config_location()?,
    };

    if path.exists() {
        return Err(format!("file already exists: {}", path.display()).into());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(&path, config::minimal_config_template())?;
    println!("Config written to: {}", path.display());
    println!("Edit it to point at your odoo.conf or set the database keys directly.");
    Ok(())
}

fn pick_config_location() -> Result<PathBuf, Box<dyn std::error::Error>> {
    prompt::require_interactive("pick a config location", "an explicit destination path")?;

    let search_paths = config::default_config_search_paths();
    let labels: &[&str] = &[
        "Local directory (next to a checked-out deployment)",
        "User config",
        "System-wide (runs as root or from a systemd timer)",
    ];
    let choices: Vec<String> = search_paths
        .iter()
        .zip(labels.iter())
        .map(|((path, _level), label)| format!("{label}: {}", path.display()))
        .collect();

    let selection = prompt::select("Where should the config file live?", &choices, 0)?;
    Ok(search_paths[selection].0.clone())
}
