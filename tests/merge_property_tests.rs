use proptest::prelude::*;
use sigwrap::{merge_signatures, Parameter, Signature};
use std::collections::BTreeSet;

fn required_signature(names: &BTreeSet<String>) -> Signature {
    Signature::new(names.iter().map(|name| Parameter::required(name.clone())).collect()).unwrap()
}

proptest! {
    #[test]
    fn merged_required_count_is_union_size(
        a in prop::collection::btree_set("[a-h]", 0..6),
        b in prop::collection::btree_set("[a-h]", 0..6),
    ) {
        let original = required_signature(&a);
        let run = required_signature(&b);
        let merged = merge_signatures(&original, &run).unwrap();
        prop_assert_eq!(merged.required_count(), a.union(&b).count());
    }

    #[test]
    fn original_names_keep_their_order(
        a in prop::collection::btree_set("[a-h]", 1..6),
        b in prop::collection::btree_set("[a-h]", 0..6),
    ) {
        let original = required_signature(&a);
        let run = required_signature(&b);
        let merged = merge_signatures(&original, &run).unwrap();
        let merged_names: Vec<_> = merged
            .parameters()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        let original_names: Vec<_> = a.iter().cloned().collect();
        prop_assert_eq!(merged_names[..a.len()].to_vec(), original_names);
    }

    #[test]
    fn merge_with_self_is_identity(names in prop::collection::btree_set("[a-h]", 0..6)) {
        let signature = required_signature(&names);
        let merged = merge_signatures(&signature, &signature).unwrap();
        prop_assert_eq!(&merged, &signature);
    }
}
