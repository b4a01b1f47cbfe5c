use std::path::Path;
use std::path::PathBuf;

use yaml_rust::Yaml;

use super::error::{ModelError, Result};


pub fn str_to_absolute_path(path_str: &str, default_base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        return path;
    } else {
        return [default_base_dir, Path::new(&path)].iter().collect();
    }
}

/// Reads a number, accepting either an integer or a float in the yaml.
pub fn yaml_f64(yaml: &Yaml, key: &str) -> Option<f64> {
    match &yaml[key] {
        Yaml::Real(_) => yaml[key].as_f64(),
        Yaml::Integer(ii) => Some(*ii as f64),
        _ => None,
    }
}

pub fn require_f64(yaml: &Yaml, key: &str) -> Result<f64> {
    yaml_f64(yaml, key).ok_or_else(|| missing(key, "a number"))
}

pub fn require_usize(yaml: &Yaml, key: &str) -> Result<usize> {
    match yaml[key].as_i64() {
        Some(val) if val >= 0 => Ok(val as usize),
        _ => Err(missing(key, "a non-negative integer")),
    }
}

pub fn require_str<'a>(yaml: &'a Yaml, key: &str) -> Result<&'a str> {
    yaml[key].as_str().ok_or_else(|| missing(key, "a string"))
}

fn missing(key: &str, what: &str) -> ModelError {
    ModelError::Config(format!("`{}` must be {}", key, what))
}
