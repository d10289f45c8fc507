use std::error::Error;
use std::fs;
use std::path::Path;
use yaml_rust2::{Yaml, YamlEmitter, YamlLoader};

/// Loads a YAML document, resolving `!include <relative path>` lines first.
///
/// Included documents are merged before the including file's own content, so
/// keys written in the including file win. Mappings merge recursively; any
/// other value is replaced wholesale.
pub fn load_yaml_with_includes(path: &Path) -> Result<Yaml, Box<dyn Error + Send + Sync>> {
    process_includes_recursive(path, 0)
}

/// Renders a merged document back to text so it can be handed to serde.
pub fn to_yaml_string(yaml: &Yaml) -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = String::new();
    YamlEmitter::new(&mut out)
        .dump(yaml)
        .map_err(|e| format!("failed to emit yaml: {:?}", e))?;
    Ok(out)
}

const MAX_INCLUDE_DEPTH: usize = 16;

fn process_includes_recursive(
    path: &Path,
    depth: usize,
) -> Result<Yaml, Box<dyn Error + Send + Sync>> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(format!("include depth exceeded at {}", path.display()).into());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let base_path = path.parent().unwrap_or(Path::new(""));

    let (includes, rest): (Vec<&str>, Vec<&str>) = contents
        .lines()
        .partition(|&line| line.trim().starts_with("!include"));

    let mut merged_includes: Option<Yaml> = None;
    for line in includes {
        let include_path = line.trim().trim_start_matches("!include").trim();
        if include_path.is_empty() {
            return Err(format!("empty !include in {}", path.display()).into());
        }
        let included = process_includes_recursive(&base_path.join(include_path), depth + 1)?;
        merged_includes = Some(match merged_includes {
            Some(acc) => merge_yaml(&acc, &included),
            None => included,
        });
    }

    let merged_rest = YamlLoader::load_from_str(&rest.join("\n"))?
        .into_iter()
        .reduce(|acc, doc| merge_yaml(&acc, &doc))
        .unwrap_or_else(|| Yaml::Hash(Default::default()));

    match merged_includes {
        Some(base) => Ok(merge_yaml(&base, &merged_rest)),
        None => Ok(merged_rest),
    }
}

fn merge_yaml(base: &Yaml, override_yaml: &Yaml) -> Yaml {
    match (base, override_yaml) {
        (Yaml::Hash(base_hash), Yaml::Hash(override_hash)) => {
            let mut result = base_hash.clone();
            for (key, value) in override_hash {
                let merged = match base_hash.get(key) {
                    Some(base_value) => merge_yaml(base_value, value),
                    None => value.clone(),
                };
                result.insert(key.clone(), merged);
            }
            Yaml::Hash(result)
        }
        // an empty document should not wipe out the included one
        (base, Yaml::Null) | (base, Yaml::BadValue) => base.clone(),
        (_, override_value) => override_value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, body: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn includes_are_merged_and_local_keys_win() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "scoring.yaml",
            "scoring:\n  risk_thresholds:\n    medium: 30\n    high: 60\n",
        );
        write(
            dir.path(),
            "main.yaml",
            "!include scoring.yaml\nscoring:\n  risk_thresholds:\n    high: 70\n",
        );

        let yaml = load_yaml_with_includes(&dir.path().join("main.yaml")).unwrap();
        let thresholds = &yaml["scoring"]["risk_thresholds"];
        assert_eq!(thresholds["medium"].as_i64(), Some(30));
        assert_eq!(thresholds["high"].as_i64(), Some(70));
    }

    #[test]
    fn missing_include_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.yaml", "!include nope.yaml\n");

        assert!(load_yaml_with_includes(&dir.path().join("main.yaml")).is_err());
    }

    #[test]
    fn emitted_yaml_round_trips_through_loader() {
        let yaml = YamlLoader::load_from_str("a:\n  b: 1\n").unwrap().remove(0);
        let text = to_yaml_string(&yaml).unwrap();
        let back = YamlLoader::load_from_str(&text).unwrap().remove(0);
        assert_eq!(back["a"]["b"].as_i64(), Some(1));
    }
}
