//! Source location attached to allocation events and error reports.

use std::borrow::Cow;

/// Where an operation was issued from.
///
/// Every component is optional: C callers may pass `NULL` for the file and
/// function and `0` for the line.
///
/// Names are borrowed from the caller; only a site read back from an audit
/// line with escaped characters owns its text.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct CallSite<'a> {
    /// Source file path.
    pub file: Option<Cow<'a, str>>,
    /// Line within `file` (0 when unknown).
    pub line: u32,
    /// Enclosing function name.
    pub function: Option<Cow<'a, str>>,
}

impl<'a> CallSite<'a> {
    /// A call site with no location information.
    pub const UNKNOWN: CallSite<'static> = CallSite {
        file: None,
        line: 0,
        function: None,
    };

    #[must_use]
    pub const fn new(file: &'a str, line: u32, function: Option<&'a str>) -> Self {
        Self {
            file: Some(Cow::Borrowed(file)),
            line,
            function: match function {
                Some(name) => Some(Cow::Borrowed(name)),
                None => None,
            },
        }
    }

    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    #[must_use]
    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }
}

/// Name of the enclosing function, without its module path.
///
/// Closures report the function that contains them.
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::core::any::type_name::<T>()
        }
        let path = __type_name_of(__here);
        let path = path.strip_suffix("::__here").unwrap_or(path);
        let mut path = path;
        while let Some(outer) = path.strip_suffix("::{{closure}}") {
            path = outer;
        }
        path.rsplit("::").next().unwrap_or(path)
    }};
}

/// Capture the current [`CallSite`] (`file!()`, `line!()`, enclosing function).
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::callsite::CallSite::new(file!(), line!(), Some($crate::function_name!()))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_has_no_location() {
        let site = CallSite::UNKNOWN;
        assert_eq!(site.file(), None);
        assert_eq!(site.line, 0);
        assert_eq!(site.function(), None);
        assert_eq!(site, CallSite::default());
    }

    #[test]
    fn call_site_macro_captures_location() {
        let site = crate::call_site!();
        assert_eq!(site.file(), Some(file!()));
        assert!(site.line > 0);
        assert_eq!(site.function(), Some("call_site_macro_captures_location"));
    }

    #[test]
    fn function_name_inside_closure_reports_enclosing_fn() {
        let name = (|| crate::function_name!())();
        assert_eq!(name, "function_name_inside_closure_reports_enclosing_fn");
    }
}
