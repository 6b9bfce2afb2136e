//! `Entry`: an attribute-name-keyed item body, plus path resolution and
//! mutation over it.

use std::collections::BTreeMap;

use super::error::EvalError;
use crate::ast::{Name, Path, PathSegment};
use crate::value::AttributeValue;

/// An item body: a mapping from attribute name to value. No schema; any
/// path may be absent.
pub type Entry = BTreeMap<String, AttributeValue>;

/// A resolved name, after substituting any `#placeholder` against
/// `ExpressionAttributeNames`.
pub fn resolve_name<'a>(name: &'a Name, names: &'a BTreeMap<String, String>) -> Result<&'a str, EvalError> {
    match name {
        Name::Literal(s) => Ok(s.as_str()),
        Name::Placeholder(p) => names
            .get(p)
            .map(String::as_str)
            .ok_or_else(|| EvalError::NameNotDefined(format!("#{p}"))),
    }
}

/// Resolves a `path` to the value it names within `entry`, substituting any
/// `#name` placeholders along the way.
pub fn resolve_path<'e>(
    path: &Path,
    entry: &'e Entry,
    names: &BTreeMap<String, String>,
) -> Result<&'e AttributeValue, EvalError> {
    let root = resolve_name(&path.root, names)?;
    let mut current = entry
        .get(root)
        .ok_or_else(|| EvalError::path_not_found(path))?;
    for seg in &path.segments {
        current = step(current, seg, names, path)?;
    }
    Ok(current)
}

fn step<'e>(
    current: &'e AttributeValue,
    seg: &PathSegment,
    names: &BTreeMap<String, String>,
    full_path: &Path,
) -> Result<&'e AttributeValue, EvalError> {
    match seg {
        PathSegment::Field(name) => {
            let key = resolve_name(name, names)?;
            match current {
                AttributeValue::M(m) => m.get(key).ok_or_else(|| EvalError::path_not_found(full_path)),
                _ => Err(EvalError::path_not_found(full_path)),
            }
        }
        PathSegment::Index(i) => match current {
            AttributeValue::L(l) => {
                let idx = usize::try_from(*i).map_err(|_| EvalError::path_not_found(full_path))?;
                l.get(idx).ok_or_else(|| EvalError::path_not_found(full_path))
            }
            _ => Err(EvalError::path_not_found(full_path)),
        },
    }
}

/// True if `resolve_path` would succeed.
#[must_use]
pub fn path_exists(path: &Path, entry: &Entry, names: &BTreeMap<String, String>) -> bool {
    resolve_path(path, entry, names).is_ok()
}

/// Writes `value` at `path`, creating intermediate map entries only at the
/// top level (nested auto-vivification is not supported, per spec). List
/// indices may append (`i == len`) but not skip ahead (`i > len` errors).
pub fn set_path(
    path: &Path,
    value: AttributeValue,
    entry: &mut Entry,
    names: &BTreeMap<String, String>,
) -> Result<(), EvalError> {
    let root = resolve_name(&path.root, names)?.to_string();
    if path.segments.is_empty() {
        entry.insert(root, value);
        return Ok(());
    }
    let mut current = entry
        .get_mut(&root)
        .ok_or_else(|| EvalError::path_not_found(path))?;
    for seg in &path.segments[..path.segments.len() - 1] {
        current = step_mut(current, seg, names, path)?;
    }
    let last = path.segments.last().expect("non-empty segments");
    match last {
        PathSegment::Field(name) => {
            let key = resolve_name(name, names)?.to_string();
            match current {
                AttributeValue::M(m) => {
                    m.insert(key, value);
                    Ok(())
                }
                _ => Err(EvalError::path_not_found(path)),
            }
        }
        PathSegment::Index(i) => match current {
            AttributeValue::L(l) => {
                let idx = usize::try_from(*i).map_err(|_| EvalError::path_not_found(path))?;
                match idx.cmp(&l.len()) {
                    std::cmp::Ordering::Less => {
                        l[idx] = value;
                        Ok(())
                    }
                    std::cmp::Ordering::Equal => {
                        l.push(value);
                        Ok(())
                    }
                    std::cmp::Ordering::Greater => Err(EvalError::path_not_found(path)),
                }
            }
            _ => Err(EvalError::path_not_found(path)),
        },
    }
}

fn step_mut<'e>(
    current: &'e mut AttributeValue,
    seg: &PathSegment,
    names: &BTreeMap<String, String>,
    full_path: &Path,
) -> Result<&'e mut AttributeValue, EvalError> {
    match seg {
        PathSegment::Field(name) => {
            let key = resolve_name(name, names)?;
            match current {
                AttributeValue::M(m) => m
                    .get_mut(key)
                    .ok_or_else(|| EvalError::path_not_found(full_path)),
                _ => Err(EvalError::path_not_found(full_path)),
            }
        }
        PathSegment::Index(i) => match current {
            AttributeValue::L(l) => {
                let idx = usize::try_from(*i).map_err(|_| EvalError::path_not_found(full_path))?;
                l.get_mut(idx).ok_or_else(|| EvalError::path_not_found(full_path))
            }
            _ => Err(EvalError::path_not_found(full_path)),
        },
    }
}

/// Removes the value at `path`. Per spec, removing a missing path is a
/// silent no-op; removing a list index shifts subsequent elements leftward.
pub fn remove_path(path: &Path, entry: &mut Entry, names: &BTreeMap<String, String>) -> Result<(), EvalError> {
    let Ok(root) = resolve_name(&path.root, names) else {
        return Ok(());
    };
    let root = root.to_string();
    if path.segments.is_empty() {
        entry.remove(&root);
        return Ok(());
    }
    let Some(mut current) = entry.get_mut(&root) else {
        return Ok(());
    };
    for seg in &path.segments[..path.segments.len() - 1] {
        current = match step_mut(current, seg, names, path) {
            Ok(c) => c,
            Err(_) => return Ok(()),
        };
    }
    let last = path.segments.last().expect("non-empty segments");
    match last {
        PathSegment::Field(name) => {
            if let Ok(key) = resolve_name(name, names) {
                if let AttributeValue::M(m) = current {
                    m.remove(key);
                }
            }
        }
        PathSegment::Index(i) => {
            if let AttributeValue::L(l) = current {
                if let Ok(idx) = usize::try_from(*i) {
                    if idx < l.len() {
                        l.remove(idx);
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn resolves_nested_map_and_list() {
        let mut m = BTreeMap::new();
        m.insert("rating".to_string(), AttributeValue::N("9.3".to_string()));
        let mut entry = Entry::new();
        entry.insert("info".to_string(), AttributeValue::M(m));
        entry.insert(
            "tags".to_string(),
            AttributeValue::L(vec![AttributeValue::S("a".into())]),
        );

        let path = Path {
            root: Name::Literal("info".into()),
            segments: vec![PathSegment::Field(Name::Literal("rating".into()))],
        };
        assert_eq!(resolve_path(&path, &entry, &names()).unwrap(), &AttributeValue::N("9.3".into()));

        let idx_path = Path {
            root: Name::Literal("tags".into()),
            segments: vec![PathSegment::Index(0)],
        };
        assert_eq!(resolve_path(&idx_path, &entry, &names()).unwrap(), &AttributeValue::S("a".into()));
    }

    #[test]
    fn missing_path_errors() {
        let entry = Entry::new();
        let path = Path::new(Name::Literal("missing".into()));
        assert!(resolve_path(&path, &entry, &names()).is_err());
    }

    #[test]
    fn list_append_at_exact_length_succeeds() {
        let mut entry = Entry::new();
        entry.insert("l".to_string(), AttributeValue::L(vec![AttributeValue::N("1".into())]));
        let path = Path {
            root: Name::Literal("l".into()),
            segments: vec![PathSegment::Index(1)],
        };
        set_path(&path, AttributeValue::N("2".into()), &mut entry, &names()).unwrap();
        assert_eq!(
            entry.get("l"),
            Some(&AttributeValue::L(vec![
                AttributeValue::N("1".into()),
                AttributeValue::N("2".into())
            ]))
        );
    }

    #[test]
    fn list_index_beyond_length_errors() {
        let mut entry = Entry::new();
        entry.insert("l".to_string(), AttributeValue::L(vec![]));
        let path = Path {
            root: Name::Literal("l".into()),
            segments: vec![PathSegment::Index(1)],
        };
        assert!(set_path(&path, AttributeValue::N("2".into()), &mut entry, &names()).is_err());
    }

    #[test]
    fn remove_missing_path_is_noop() {
        let mut entry = Entry::new();
        let path = Path::new(Name::Literal("missing".into()));
        assert!(remove_path(&path, &mut entry, &names()).is_ok());
    }

    #[test]
    fn remove_list_index_shifts_left() {
        let mut entry = Entry::new();
        entry.insert(
            "l".to_string(),
            AttributeValue::L(vec![
                AttributeValue::N("1".into()),
                AttributeValue::N("2".into()),
                AttributeValue::N("3".into()),
            ]),
        );
        let path = Path {
            root: Name::Literal("l".into()),
            segments: vec![PathSegment::Index(0)],
        };
        remove_path(&path, &mut entry, &names()).unwrap();
        assert_eq!(
            entry.get("l"),
            Some(&AttributeValue::L(vec![
                AttributeValue::N("2".into()),
                AttributeValue::N("3".into())
            ]))
        );
    }
}
