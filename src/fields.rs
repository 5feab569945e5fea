// 🧬 Field Differ - explicit per-entity field tables
//
// Each entity kind declares an ordered table of fields. A field knows how
// to read itself, how to write itself, and what "equal" means for its
// type (numeric for money, by instant for timestamps). Diffing walks the
// table; nothing is discovered at runtime.

type Differs<E> = Box<dyn Fn(&E, &E) -> bool + Send + Sync>;
type Apply<E> = Box<dyn Fn(&E, &mut E) -> Result<(), String> + Send + Sync>;

// ============================================================================
// FIELD DESCRIPTOR
// ============================================================================

/// One diffable field of entity `E`
pub struct FieldDescriptor<E> {
    name: &'static str,
    differs: Differs<E>,
    apply: Apply<E>,
}

impl<E: 'static> FieldDescriptor<E> {
    /// Field with its own equality and a setter that may reject a value
    pub fn new<V>(
        name: &'static str,
        get: fn(&E) -> &V,
        set: fn(&mut E, V) -> Result<(), String>,
        eq: fn(&V, &V) -> bool,
    ) -> Self
    where
        V: Clone + 'static,
    {
        FieldDescriptor {
            name,
            differs: Box::new(move |a: &E, b: &E| !eq(get(a), get(b))),
            apply: Box::new(move |from: &E, into: &mut E| set(into, get(from).clone())),
        }
    }

    /// Field compared with `PartialEq` and written unconditionally
    pub fn plain<V>(name: &'static str, get: fn(&E) -> &V, set: fn(&mut E, V)) -> Self
    where
        V: Clone + PartialEq + 'static,
    {
        FieldDescriptor {
            name,
            differs: Box::new(move |a: &E, b: &E| get(a) != get(b)),
            apply: Box::new(move |from: &E, into: &mut E| {
                set(into, get(from).clone());
                Ok(())
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn differs(&self, current: &E, proposed: &E) -> bool {
        (self.differs)(current, proposed)
    }

    /// Copy this field's value from `from` into `into`
    pub fn apply(&self, from: &E, into: &mut E) -> Result<(), String> {
        (self.apply)(from, into)
    }
}

impl<E> std::fmt::Debug for FieldDescriptor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// FIELD DIFFER
// ============================================================================

/// Compares two instances of one entity kind field by field
#[derive(Debug)]
pub struct FieldDiffer<E> {
    fields: Vec<FieldDescriptor<E>>,
}

impl<E: 'static> FieldDiffer<E> {
    pub fn new(fields: Vec<FieldDescriptor<E>>) -> Self {
        FieldDiffer { fields }
    }

    /// Names of the fields whose values differ, in table order.
    /// Neither input is touched.
    pub fn diff(&self, current: &E, proposed: &E) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|field| field.differs(current, proposed))
            .map(|field| field.name())
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<E>> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|field| field.name()).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Sample {
        label: String,
        score: i32,
        tags: Vec<String>,
        note: Option<String>,
    }

    fn sample() -> Sample {
        Sample {
            label: "a".to_string(),
            score: 1,
            tags: vec!["x".to_string()],
            note: None,
        }
    }

    fn differ() -> FieldDiffer<Sample> {
        type F = FieldDescriptor<Sample>;
        FieldDiffer::new(vec![
            F::plain("label", |s| &s.label, |s, v| s.label = v),
            F::new(
                "score",
                |s| &s.score,
                |s, v| {
                    if v < 0 {
                        return Err(format!("negative score {}", v));
                    }
                    s.score = v;
                    Ok(())
                },
                |a, b| a == b,
            ),
            F::plain("tags", |s| &s.tags, |s, v| s.tags = v),
            F::plain("note", |s| &s.note, |s, v| s.note = v),
        ])
    }

    #[test]
    fn test_identical_instances_have_no_diff() {
        let a = sample();
        assert!(differ().diff(&a, &a.clone()).is_empty());
    }

    #[test]
    fn test_diff_lists_changed_fields_in_table_order() {
        let a = sample();
        let mut b = a.clone();
        b.note = Some("hello".to_string());
        b.label = "b".to_string();

        assert_eq!(differ().diff(&a, &b), vec!["label", "note"]);
        // inputs untouched
        assert_eq!(a, sample());
    }

    #[test]
    fn test_collections_compare_element_wise() {
        let a = sample();
        let mut b = a.clone();
        b.tags.push("y".to_string());

        assert_eq!(differ().diff(&a, &b), vec!["tags"]);
    }

    #[test]
    fn test_null_equals_null() {
        let a = sample();
        let b = sample();
        assert!(a.note.is_none() && b.note.is_none());
        assert!(!differ().field("note").unwrap().differs(&a, &b));
    }

    #[test]
    fn test_apply_copies_value() {
        let d = differ();
        let mut into = sample();
        let mut from = sample();
        from.score = 42;

        d.field("score").unwrap().apply(&from, &mut into).unwrap();
        assert_eq!(into.score, 42);
    }

    #[test]
    fn test_apply_can_reject() {
        let d = differ();
        let mut into = sample();
        let mut from = sample();
        from.score = -1;

        let err = d.field("score").unwrap().apply(&from, &mut into).unwrap_err();
        assert_eq!(err, "negative score -1");
        assert_eq!(into.score, 1);
    }

    #[test]
    fn test_field_names() {
        assert_eq!(differ().field_names(), vec!["label", "score", "tags", "note"]);
    }
}
