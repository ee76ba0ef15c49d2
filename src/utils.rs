//! Some utility functions

use minidom::Element;
use url::Url;

/// Walks an XML tree and returns every element that has the given name
pub fn find_elems<S: AsRef<str>>(root: &Element, searched_name: S) -> Vec<&Element> {
    let searched_name = searched_name.as_ref();
    let mut elems: Vec<&Element> = Vec::new();

    for el in root.children() {
        if el.name() == searched_name {
            elems.push(el);
        } else {
            let ret = find_elems(el, searched_name);
            elems.extend(ret);
        }
    }
    elems
}

/// Walks an XML tree until it finds an element with the given name
pub fn find_elem<S: AsRef<str>>(root: &Element, searched_name: S) -> Option<&Element> {
    let searched_name = searched_name.as_ref();
    if root.name() == searched_name {
        return Some(root);
    }

    for el in root.children() {
        if el.name() == searched_name {
            return Some(el);
        } else {
            let ret = find_elem(el, searched_name);
            if ret.is_some() {
                return ret;
            }
        }
    }
    None
}

/// Compare two URLs for canonical equality.
///
/// Servers are inconsistent about trailing slashes on collection hrefs, so
/// `https://host/cal/work` and `https://host/cal/work/` name the same
/// collection.
pub fn urls_match(left: &Url, right: &Url) -> bool {
    if left == right {
        return true;
    }
    if left.scheme() != right.scheme() || left.host_str() != right.host_str() || left.port() != right.port() {
        return false;
    }
    left.path().trim_end_matches('/') == right.path().trim_end_matches('/')
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_match() {
        let plain: Url = "https://cal.example.com/dav/work".parse().unwrap();
        let slashed: Url = "https://cal.example.com/dav/work/".parse().unwrap();
        let other: Url = "https://cal.example.com/dav/home/".parse().unwrap();
        let other_host: Url = "https://cal.example.org/dav/work/".parse().unwrap();

        assert!(urls_match(&plain, &slashed));
        assert!(urls_match(&plain, &plain));
        assert!(urls_match(&slashed, &plain));
        assert!(urls_match(&plain, &other) == false);
        assert!(urls_match(&slashed, &other_host) == false);
    }

    #[test]
    fn test_find_elem() {
        let xml = r#"<multistatus xmlns="DAV:"><response><href>/cal/1.ics</href></response></multistatus>"#;
        let root: Element = xml.parse().unwrap();
        assert_eq!(find_elem(&root, "href").map(|e| e.text()), Some("/cal/1.ics".to_string()));
        assert!(find_elem(&root, "getetag").is_none());
        assert_eq!(find_elems(&root, "response").len(), 1);
    }
}
