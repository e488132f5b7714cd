use crate::entities::{Instance, Module, SymAxis, SymmetryGroup};
use anyhow::{bail, ensure, Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Reads a placement instance from a text file.
///
/// The format is line-oriented; `#` starts a comment and blank lines are
/// ignored:
///
/// ```text
/// Module   <name> <width> <height>
/// SymGroup <name> <vertical|horizontal>
/// SymPair  <a> <b>
/// SelfSym  <m>
/// ```
///
/// `SymPair` and `SelfSym` records belong to the most recent `SymGroup`.
pub fn read_instance(path: &Path) -> Result<Instance> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("could not read instance file {path:?}"))?;
    parse_instance(&content).with_context(|| format!("could not parse instance file {path:?}"))
}

/// Parses an instance from its textual representation. See [`read_instance`].
pub fn parse_instance(content: &str) -> Result<Instance> {
    let mut modules: Vec<Module> = Vec::new();
    // name -> (axis, pairs, self-symmetric), in declaration order
    let mut groups: Vec<(String, SymAxis, Vec<(String, String)>, Vec<String>)> = Vec::new();

    for (line_no, raw) in content.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let context = || format!("line {}: '{}'", line_no + 1, raw.trim());
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().unwrap();
        let rest: Vec<&str> = tokens.collect();

        match keyword {
            "Module" => {
                let [name, w, h] = rest_as_array(&rest).with_context(context)?;
                let width: i64 = w.parse().with_context(context)?;
                let height: i64 = h.parse().with_context(context)?;
                modules.push(Module::try_new(name, width, height).with_context(context)?);
            }
            "SymGroup" => {
                let [name, axis] = rest_as_array(&rest).with_context(context)?;
                let axis = match axis {
                    "vertical" => SymAxis::Vertical,
                    "horizontal" => SymAxis::Horizontal,
                    other => bail!("{}: unknown axis '{other}'", context()),
                };
                groups.push((name.to_string(), axis, Vec::new(), Vec::new()));
            }
            "SymPair" => {
                let [a, b] = rest_as_array(&rest).with_context(context)?;
                let group = groups
                    .last_mut()
                    .with_context(|| format!("{}: SymPair before any SymGroup", context()))?;
                group.2.push((a.to_string(), b.to_string()));
            }
            "SelfSym" => {
                let [name] = rest_as_array(&rest).with_context(context)?;
                let group = groups
                    .last_mut()
                    .with_context(|| format!("{}: SelfSym before any SymGroup", context()))?;
                group.3.push(name.to_string());
            }
            other => bail!("{}: unknown record '{other}'", context()),
        }
    }

    validate(&modules, &groups)?;

    let symmetry_groups = groups
        .into_iter()
        .map(|(name, axis, pairs, self_symmetric)| {
            SymmetryGroup::try_new(name, axis, pairs, self_symmetric)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Instance::new(modules, symmetry_groups))
}

fn rest_as_array<'a, const N: usize>(rest: &[&'a str]) -> Result<[&'a str; N]> {
    let array: [&str; N] = rest
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected {N} fields, got {}", rest.len()))?;
    Ok(array)
}

fn validate(
    modules: &[Module],
    groups: &[(String, SymAxis, Vec<(String, String)>, Vec<String>)],
) -> Result<()> {
    let mut dims: HashMap<&str, (i64, i64)> = HashMap::new();
    for m in modules {
        ensure!(
            dims.insert(&m.name, (m.width(), m.height())).is_none(),
            "module '{}' is declared twice",
            m.name
        );
    }

    let mut group_names = HashSet::new();
    let mut assigned: HashSet<&str> = HashSet::new();
    for (name, _, pairs, self_symmetric) in groups {
        ensure!(
            group_names.insert(name.as_str()),
            "symmetry group '{name}' is declared twice"
        );
        let members = pairs
            .iter()
            .flat_map(|(a, b)| [a.as_str(), b.as_str()])
            .chain(self_symmetric.iter().map(String::as_str));
        for member in members {
            ensure!(
                dims.contains_key(member),
                "symmetry group '{name}' references undeclared module '{member}'"
            );
            ensure!(
                assigned.insert(member),
                "module '{member}' belongs to more than one symmetry group"
            );
        }
        for (a, b) in pairs {
            ensure!(
                dims[a.as_str()] == dims[b.as_str()],
                "symmetry pair ('{a}', '{b}') in group '{name}' has mismatched dimensions"
            );
        }
    }
    Ok(())
}
