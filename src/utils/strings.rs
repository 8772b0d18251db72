use super::hash::FastHashSet;

/// Splits a space-delimited capability string (like `GL_EXTENSIONS`) into a set.
pub fn split_to_set(desc: &str) -> FastHashSet<String> {
    desc.split(' ')
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_owned())
        .collect()
}
