//! Incremental XML namespace resolution for the pull parser.

use quick_xml::events::BytesStart;

use super::ParseError;

/// Namespace bindings in scope at the parser's current position.
///
/// Each start tag opens a scope holding the `xmlns` declarations found on it;
/// the matching end tag closes it again. Prefixes are therefore resolvable
/// as soon as the element that declares them has been read.
#[derive(Debug, Default)]
pub struct NamespaceResolver {
    scopes: Vec<Vec<(Option<String>, String)>>,
}

/// A tag name split into its namespace URI and local part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// Bound namespace, or `None` when the prefix is unbound.
    pub namespace: Option<String>,
    /// Name without its prefix.
    pub local: String,
}

impl NamespaceResolver {
    /// Record the declarations carried by `start` and open its scope.
    pub fn enter(&mut self, start: &BytesStart<'_>) -> Result<(), ParseError> {
        let mut declarations = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = attribute.key.as_ref();
            let prefix = if key == b"xmlns" {
                None
            } else if let Some(prefix) = key.strip_prefix(b"xmlns:") {
                Some(utf8(prefix)?.to_owned())
            } else {
                continue;
            };
            let uri = attribute.unescape_value()?.into_owned();
            declarations.push((prefix, uri));
        }
        self.scopes.push(declarations);
        Ok(())
    }

    /// Close the innermost scope.
    pub fn leave(&mut self) {
        self.scopes.pop();
    }

    /// URI bound to `prefix` (`None` selects the default namespace).
    #[must_use]
    pub fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(bound, _)| bound.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Bindings visible at the innermost element that were declared by its
    /// ancestors, outermost first. Prefixes the element redeclares itself
    /// are left out.
    #[must_use]
    pub fn inherited(&self) -> Vec<(Option<&str>, &str)> {
        let Some((own, ancestors)) = self.scopes.split_last() else {
            return Vec::new();
        };
        let mut bindings: Vec<(Option<&str>, &str)> = Vec::new();
        for (prefix, uri) in ancestors.iter().rev().flat_map(|scope| scope.iter().rev()) {
            let prefix = prefix.as_deref();
            let shadowed = own.iter().any(|(bound, _)| bound.as_deref() == prefix)
                || bindings.iter().any(|(bound, _)| *bound == prefix);
            if !shadowed {
                bindings.push((prefix, uri.as_str()));
            }
        }
        bindings.reverse();
        bindings
    }

    /// Resolve a qualified tag name against the bindings in scope.
    pub fn resolve(&self, qname: &[u8]) -> Result<ResolvedName, ParseError> {
        let qname = utf8(qname)?;
        let (prefix, local) = match qname.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, qname),
        };
        Ok(ResolvedName {
            namespace: self.lookup(prefix).map(str::to_owned),
            local: local.to_owned(),
        })
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|err| ParseError::Encoding {
        detail: String::from_utf8_lossy(bytes).into_owned(),
        source: err,
    })
}

