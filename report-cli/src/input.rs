//! Đọc dữ liệu đầu vào từ file, thư mục hoặc stdin.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use walkdir::WalkDir;

/// Đọc đầu vào theo đường dẫn (`-` là stdin).
///
/// Thư mục: gom mọi resource trong các file `.json`/`.ndjson` thành một mảng.
/// File `.ndjson`: mỗi dòng một resource. File khác: JSON nếu đọc được,
/// ngược lại giữ nguyên dạng chuỗi (CCDA XML).
pub fn load_input(path: &Path) -> anyhow::Result<Value> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Không đọc được stdin")?;
        return Ok(parse_or_text(raw));
    }

    let meta = fs::metadata(path).with_context(|| format!("Không đọc được {:?}", path))?;
    if meta.is_dir() {
        let resources = collect_dir(path)?;
        tracing::info!(dir = ?path, resources = resources.len(), "collected resources");
        return Ok(Value::Array(resources));
    }

    let raw =
        fs::read_to_string(path).with_context(|| format!("Không đọc được file {:?}", path))?;
    if has_extension(path, "ndjson") {
        return Ok(Value::Array(parse_ndjson(&raw)));
    }
    Ok(parse_or_text(raw))
}

/// Duyệt đệ quy thư mục theo thứ tự tên file, bỏ qua mục không đọc được hoặc
/// không phải JSON.
pub fn collect_dir(dir: &Path) -> anyhow::Result<Vec<Value>> {
    let mut resources = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(err).with_context(|| format!("Không đọc được thư mục {:?}", dir));
            }
            Err(err) => {
                tracing::warn!(path = ?err.path(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let ndjson = has_extension(path, "ndjson");
        if !ndjson && !has_extension(path, "json") {
            continue;
        }
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(file = ?path, error = %err, "skipping unreadable file");
                continue;
            }
        };
        if ndjson {
            resources.extend(parse_ndjson(&raw));
            continue;
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => resources.extend(resources_of(value)),
            Err(err) => tracing::debug!(file = ?path, error = %err, "skipping non-JSON file"),
        }
    }
    Ok(resources)
}

/// Mỗi dòng không rỗng là một resource; dòng hỏng hoặc không có `resourceType` bị bỏ.
pub fn parse_ndjson(raw: &str) -> Vec<Value> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(has_resource_type)
        .collect()
}

/// Resource trong một mảng, một Bundle hoặc một resource đơn.
fn resources_of(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.into_iter().filter(has_resource_type).collect(),
        Value::Object(mut map) => {
            if map.get("resourceType").and_then(Value::as_str) == Some("Bundle") {
                match map.remove("entry") {
                    Some(Value::Array(entries)) => entries
                        .into_iter()
                        .filter_map(|mut entry| entry.get_mut("resource").map(Value::take))
                        .filter(has_resource_type)
                        .collect(),
                    _ => Vec::new(),
                }
            } else {
                let value = Value::Object(map);
                if has_resource_type(&value) {
                    vec![value]
                } else {
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    }
}

fn has_resource_type(value: &Value) -> bool {
    value
        .get("resourceType")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.is_empty())
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn parse_or_text(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn directory_is_walked_recursively() {
        let dir = tempfile::tempdir().expect("Không tạo được thư mục tạm");
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).expect("Không tạo được thư mục con");

        fs::write(
            dir.path().join("a_bundle.json"),
            json!({"resourceType": "Bundle", "entry": [{"resource": {"resourceType": "Patient", "id": "p1"}}, {}]}).to_string(),
        )
        .expect("Không ghi được file");
        fs::write(
            dir.path().join("b_array.json"),
            json!([{"resourceType": "Condition"}, {"note": "untyped"}]).to_string(),
        )
        .expect("Không ghi được file");
        fs::write(
            nested.join("c.ndjson"),
            "{\"resourceType\":\"Observation\"}\n\nnot json\n{\"resourceType\":\"Encounter\"}\n",
        )
        .expect("Không ghi được file");
        fs::write(dir.path().join("d_single.json"), r#"{"resourceType": "Device"}"#)
            .expect("Không ghi được file");
        fs::write(dir.path().join("broken.json"), "{oops").expect("Không ghi được file");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("Không ghi được file");

        let loaded = load_input(dir.path()).expect("Không đọc được thư mục");
        let types: Vec<&str> = loaded
            .as_array()
            .expect("phải là mảng")
            .iter()
            .filter_map(|r| r["resourceType"].as_str())
            .collect();
        assert_eq!(types, vec!["Patient", "Condition", "Device", "Observation", "Encounter"]);
    }

    #[test]
    fn nested_directories_follow_name_order() {
        let dir = tempfile::tempdir().expect("Không tạo được thư mục tạm");
        let deep = dir.path().join("a").join("deeper");
        fs::create_dir_all(&deep).expect("Không tạo được thư mục con");
        fs::write(deep.join("z.json"), r#"{"resourceType": "Patient", "id": "deep"}"#)
            .expect("Không ghi được file");
        fs::write(dir.path().join("b.json"), r#"{"resourceType": "Patient", "id": "top"}"#)
            .expect("Không ghi được file");
        fs::write(dir.path().join("a").join("m.ndjson"), "{\"resourceType\":\"Patient\",\"id\":\"mid\"}\n")
            .expect("Không ghi được file");

        let resources = collect_dir(dir.path()).expect("Không đọc được thư mục");
        let ids: Vec<&str> = resources.iter().filter_map(|r| r["id"].as_str()).collect();
        assert_eq!(ids, vec!["deep", "mid", "top"]);
    }

    #[test]
    fn non_json_file_passes_through_as_text() {
        let dir = tempfile::tempdir().expect("Không tạo được thư mục tạm");
        let path = dir.path().join("doc.xml");
        fs::write(&path, "<ClinicalDocument/>").expect("Không ghi được file");
        assert_eq!(load_input(&path).expect("Không đọc được file"), json!("<ClinicalDocument/>"));
    }

    #[test]
    fn ndjson_file_becomes_array() {
        let dir = tempfile::tempdir().expect("Không tạo được thư mục tạm");
        let path = dir.path().join("export.NDJSON");
        fs::write(&path, "{\"resourceType\":\"Patient\"}\n{\"id\":\"x\"}\n").expect("Không ghi được file");
        assert_eq!(
            load_input(&path).expect("Không đọc được file"),
            json!([{"resourceType": "Patient"}])
        );
    }

    #[test]
    fn missing_path_is_an_error() {
        let err = load_input(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("Không đọc được"));
    }
}
