//! CLI command for comparing object-tree dumps

use std::path::Path;

use serde_json::Value;

use crate::report::compare_object_dumps;

pub fn execute(left: &Path, right: &Path, max: usize) -> anyhow::Result<()> {
    let left_dump: Value = serde_json::from_str(&std::fs::read_to_string(left)?)?;
    let right_dump: Value = serde_json::from_str(&std::fs::read_to_string(right)?)?;

    let comparison = compare_object_dumps(&left_dump, &right_dump, max);

    println!("Left:  {} ({} objects)", left.display(), comparison.left_objects);
    println!("Right: {} ({} objects)", right.display(), comparison.right_objects);
    if !comparison.only_left.is_empty() {
        println!("Only in left: {:?}", comparison.only_left);
    }
    if !comparison.only_right.is_empty() {
        println!("Only in right: {:?}", comparison.only_right);
    }
    for line in &comparison.diffs {
        println!("{line}");
    }

    if comparison.diffs.is_empty()
        && comparison.only_left.is_empty()
        && comparison.only_right.is_empty()
    {
        println!("Dumps match");
    } else {
        println!();
        println!("{} differences", comparison.diffs.len());
    }
    Ok(())
}
