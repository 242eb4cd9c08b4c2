use fetchsync_core::{with_cancel, Error, KeyedStore, NamedValue, Result, ValueSource};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Resolves [`NamedValue`]s against a keyed store.
pub struct ValueResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: KeyedStore + ?Sized> ValueResolver<'a, S> {
    pub fn new(store: &'a S) -> Self { Self { store } }

    /// First non-empty source wins (ConfigMap, Secret, literal), trimmed and
    /// then formatted. When nothing yields a value the result is an empty
    /// string, unless a lookup failed on the way: that error is returned
    /// instead so the caller can tell "unset" from "unreachable".
    pub async fn resolve(&self, nv: &NamedValue, cancel: &CancellationToken) -> Result<String> {
        let mut lookup_err: Option<Error> = None;
        let mut found: Option<String> = None;
        for source in nv.sources() {
            let candidate = match source {
                ValueSource::Lookup(at) => match with_cancel(cancel, self.store.get(&at)).await {
                    Ok(v) => v,
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => {
                        debug!(name = %nv.name, source = %at, error = %e, "value source lookup failed");
                        lookup_err = Some(e);
                        None
                    }
                },
                ValueSource::Literal(v) => Some(v),
            };
            if let Some(v) = candidate.filter(|v| !v.is_empty()) {
                found = Some(v);
                break;
            }
        }

        let raw = match (found, lookup_err) {
            (Some(v), _) => v,
            (None, Some(e)) => return Err(e),
            (None, None) => return Ok(String::new()),
        };
        let value = raw.trim();
        match nv.format.as_deref() {
            Some(template) => apply_format(template, value),
            None => Ok(value.to_string()),
        }
    }
}

/// Substitute `value` into the single `%s` of `template`. `%%` renders a
/// literal percent sign; any other `%x` pair is copied through.
pub fn apply_format(template: &str, value: &str) -> Result<String> {
    let mut out = String::with_capacity(template.len() + value.len());
    let mut found = 0usize;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                found += 1;
                out.push_str(value);
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    if found != 1 {
        return Err(Error::FormatInvalid { template: template.to_string(), found });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_substitutes_single_placeholder() {
        assert_eq!(apply_format("Bearer %s", "abc").unwrap(), "Bearer abc");
        assert_eq!(apply_format("%s", "x").unwrap(), "x");
        assert_eq!(apply_format("100%% of %s", "it").unwrap(), "100% of it");
        assert_eq!(apply_format("%d-%s", "v").unwrap(), "%d-v");
    }

    #[test]
    fn format_rejects_wrong_placeholder_count() {
        for (t, n) in [("Bearer", 0usize), ("%s:%s", 2), ("%%s", 0), ("", 0)] {
            match apply_format(t, "v") {
                Err(Error::FormatInvalid { found, .. }) => assert_eq!(found, n, "template {:?}", t),
                other => panic!("template {:?}: unexpected {:?}", t, other),
            }
        }
    }

    #[test]
    fn value_containing_placeholder_is_not_reexpanded() {
        assert_eq!(apply_format("k=%s", "%s%s").unwrap(), "k=%s%s");
    }
}
