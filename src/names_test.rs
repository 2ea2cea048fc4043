use super::*;

#[test]
fn test_get_or_insert_is_stable() {
    let mut names = NameDictionary::new();
    let a = names.get_or_insert(NameSpace::LocalName, "article");
    let b = names.get_or_insert(NameSpace::LocalName, "title");
    assert_eq!(a, 0);
    assert_eq!(b, 1);
    assert_eq!(names.get_or_insert(NameSpace::LocalName, "article"), a);
    assert_eq!(names.get(NameSpace::LocalName, "title"), b);
    assert_eq!(names.get(NameSpace::LocalName, "missing"), NULL_NAME_KEY);
}

#[test]
fn test_namespaces_are_disjoint() {
    let mut names = NameDictionary::new();
    let uri = names.get_or_insert(NameSpace::Uri, "ns");
    let local = names.get_or_insert(NameSpace::LocalName, "ns");
    assert_eq!((uri, local), (0, 0));
    assert_eq!(names.resolve(NameSpace::Uri, uri), Some("ns"));
    assert_eq!(names.resolve(NameSpace::Prefix, 0), None);
}

#[test]
fn test_resolve_bounds() {
    let names = NameDictionary::new();
    assert_eq!(names.resolve(NameSpace::LocalName, -1), None);
    assert_eq!(names.resolve(NameSpace::LocalName, 7), None);
}

#[test]
fn test_encode_decode() {
    let mut names = NameDictionary::new();
    names.get_or_insert(NameSpace::Uri, "http://example.com");
    names.get_or_insert(NameSpace::Prefix, "ex");
    names.get_or_insert(NameSpace::LocalName, "a");
    names.get_or_insert(NameSpace::LocalName, "b");

    let mut buf = vec![];
    names.encode(&mut buf);
    let back = NameDictionary::decode(&mut buf.as_slice()).unwrap();

    assert_eq!(back.get(NameSpace::Uri, "http://example.com"), 0);
    assert_eq!(back.get(NameSpace::Prefix, "ex"), 0);
    assert_eq!(back.get(NameSpace::LocalName, "a"), 0);
    assert_eq!(back.get(NameSpace::LocalName, "b"), 1);
    assert_eq!(back.resolve(NameSpace::LocalName, 1), Some("b"));
}
