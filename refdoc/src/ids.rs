//! Stable element ids
//!
//! Ids are allocated per page so that several rendering roots can share one
//! document without collisions.

use std::collections::HashSet;

/// Allocates unique element ids
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    /// Create an allocator with no ids in use
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` has been handed out or reserved
    pub fn is_used(&self, id: &str) -> bool {
        self.used.contains(id)
    }

    /// Mark `id` as taken; returns `false` if it already was
    pub fn reserve(&mut self, id: &str) -> bool {
        self.used.insert(id.to_string())
    }

    /// Allocate an id
    ///
    /// An author-supplied id is kept as-is when free. Otherwise the id is
    /// derived from `text`, and a numeric suffix is appended until unique.
    pub fn allocate(&mut self, preferred: Option<&str>, text: &str) -> String {
        if let Some(preferred) = preferred {
            if self.reserve(preferred) {
                return preferred.to_string();
            }
            log::warn!("Duplicate id '{}', generating a unique one", preferred);
        }

        let base = match preferred {
            Some(preferred) => slugify(preferred),
            None => slugify(text),
        };
        if base.is_empty() {
            return self.derive("section");
        }
        self.derive(&base)
    }

    /// Allocate an id for an element owned by another, such as `<id>-content`
    ///
    /// `base` is used verbatim when free, otherwise a numeric suffix is
    /// appended until unique.
    pub fn derive(&mut self, base: &str) -> String {
        if self.reserve(base) {
            return base.to_string();
        }
        let mut counter = 2;
        loop {
            let candidate = format!("{}-{}", base, counter);
            if self.reserve(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Lowercase, dash-separated form of `text` suitable for an id
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
