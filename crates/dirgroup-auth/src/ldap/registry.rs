//! Group object class registry

use dirgroup_core::config::{MemberKind, ObjectClassConfig};
use dirgroup_core::types::filter::{combine, equality_filter, FilterOp};
use dirgroup_core::types::Attributes;
use once_cell::sync::OnceCell;

/// Configured group object classes and the attribute holding each one's
/// member list.
///
/// The combined class filter and the member attribute list are derived once
/// on first use and never change afterwards. Concurrent first callers may
/// each compute them; the computation is pure, so only duplicate work (never
/// a different value) can result.
#[derive(Debug, Default)]
pub struct ObjectClassRegistry {
    classes: Vec<ObjectClassConfig>,
    class_filter: OnceCell<String>,
    member_attributes: OnceCell<Vec<String>>,
}

impl ObjectClassRegistry {
    pub fn new(classes: Vec<ObjectClassConfig>) -> Self {
        Self {
            classes,
            class_filter: OnceCell::new(),
            member_attributes: OnceCell::new(),
        }
    }

    pub fn classes(&self) -> &[ObjectClassConfig] {
        &self.classes
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// `(|(objectClass=C1)(objectClass=C2)...)`, or empty when no classes
    /// are configured.
    pub fn group_class_filter(&self) -> &str {
        self.class_filter.get_or_init(|| {
            combine(
                FilterOp::Or,
                self.classes
                    .iter()
                    .map(|class| equality_filter("objectClass", &class.name)),
            )
        })
    }

    /// Distinct member list attribute names across all classes.
    pub fn member_attributes(&self) -> &[String] {
        self.member_attributes.get_or_init(|| {
            let mut attributes: Vec<String> = Vec::new();
            for class in &self.classes {
                if !attributes
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(&class.member_attribute))
                {
                    attributes.push(class.member_attribute.clone());
                }
            }
            attributes
        })
    }

    /// Configured classes the entry carries.
    pub fn classes_of<'a>(
        &'a self,
        attributes: &'a Attributes,
    ) -> impl Iterator<Item = &'a ObjectClassConfig> + 'a {
        self.classes
            .iter()
            .filter(move |class| attributes.has_value("objectClass", &class.name))
    }

    pub fn is_group_entry(&self, attributes: &Attributes) -> bool {
        self.classes_of(attributes).next().is_some()
    }

    pub fn has_kind(&self, kind: MemberKind) -> bool {
        self.classes.iter().any(|class| class.kind == kind)
    }
}
