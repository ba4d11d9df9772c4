//! Instance selection by project tag.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::provider::{FleetProvider, Instance, TagFilter};

/// Logical description of the instances a command targets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Selector {
    /// Every instance visible to the provider.
    All,
    /// Instances whose `Project` tag equals the name.
    Project(String),
}

/// Errors raised while building a [`Selector`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SelectorError {
    /// The project name was empty after trimming.
    #[error("project name must not be blank")]
    BlankProject,
    /// The project name contains a character the tag filter cannot express.
    #[error("project name '{name}' contains unsupported character {character:?}")]
    UnsupportedCharacter {
        /// Project name as supplied.
        name: String,
        /// First offending character.
        character: char,
    },
}

impl Selector {
    /// Builds a selector from an optional `--project` value.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] when the project name is blank or contains
    /// control characters, `,` or `=`.
    pub fn from_project(project: Option<&str>) -> Result<Self, SelectorError> {
        let Some(raw) = project else {
            return Ok(Self::All);
        };

        let name = raw.trim();
        if name.is_empty() {
            return Err(SelectorError::BlankProject);
        }
        if let Some(character) = name
            .chars()
            .find(|ch| ch.is_control() || matches!(*ch, ',' | '='))
        {
            return Err(SelectorError::UnsupportedCharacter {
                name: name.to_owned(),
                character,
            });
        }

        Ok(Self::Project(name.to_owned()))
    }

    /// Translates the selector into the provider-side tag filter.
    #[must_use]
    pub fn tag_filter(&self) -> Option<TagFilter> {
        match self {
            Self::All => None,
            Self::Project(name) => Some(TagFilter::project(name.clone())),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all instances"),
            Self::Project(name) => write!(f, "project {name}"),
        }
    }
}

/// Resolves selectors into instance sets through a provider.
#[derive(Debug)]
pub struct InstanceFilter<'p, P> {
    provider: &'p P,
}

impl<'p, P: FleetProvider> InstanceFilter<'p, P> {
    /// Creates a filter backed by the provider.
    #[must_use]
    pub const fn new(provider: &'p P) -> Self {
        Self { provider }
    }

    /// Enumerates the instances matching the selector.
    ///
    /// Every call performs a fresh enumeration, so repeated resolution sees
    /// the provider's current view of the fleet.
    ///
    /// # Errors
    ///
    /// Propagates provider errors unchanged.
    pub async fn resolve(&self, selector: &Selector) -> Result<Vec<Instance>, P::Error> {
        let filter = selector.tag_filter();
        let instances = self.provider.list_instances(filter.as_ref()).await?;
        debug!(%selector, count = instances.len(), "resolved instance selector");
        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeFleet, ProviderCall, instance};
    use rstest::rstest;

    #[test]
    fn missing_project_selects_everything() {
        let selector = Selector::from_project(None).expect("selector");
        assert_eq!(selector, Selector::All);
        assert_eq!(selector.tag_filter(), None);
    }

    #[test]
    fn project_is_trimmed_and_mapped_to_tag_filter() {
        let selector = Selector::from_project(Some("  demo ")).expect("selector");
        assert_eq!(selector, Selector::Project(String::from("demo")));
        assert_eq!(selector.tag_filter(), Some(TagFilter::project("demo")));
    }

    #[rstest]
    #[case("", SelectorError::BlankProject)]
    #[case("   ", SelectorError::BlankProject)]
    #[case("a,b", SelectorError::UnsupportedCharacter { name: String::from("a,b"), character: ',' })]
    #[case("a=b", SelectorError::UnsupportedCharacter { name: String::from("a=b"), character: '=' })]
    #[case("a\tb", SelectorError::UnsupportedCharacter { name: String::from("a\tb"), character: '\t' })]
    fn malformed_projects_are_rejected(#[case] input: &str, #[case] expected: SelectorError) {
        assert_eq!(Selector::from_project(Some(input)), Err(expected));
    }

    #[tokio::test]
    async fn resolve_passes_project_filter_to_provider() {
        let fleet = FakeFleet::new();
        fleet.add_instance(instance("i-a", Some("demo")), Vec::new());
        fleet.add_instance(instance("i-b", Some("other")), Vec::new());
        fleet.add_instance(instance("i-c", None), Vec::new());

        let selector = Selector::Project(String::from("demo"));
        let resolved = InstanceFilter::new(&fleet)
            .resolve(&selector)
            .await
            .expect("resolve");

        let ids: Vec<_> = resolved.iter().map(|inst| inst.id.as_str()).collect();
        assert_eq!(ids, ["i-a"]);
        assert_eq!(
            fleet.calls(),
            vec![ProviderCall::ListInstances(Some(TagFilter::project("demo")))]
        );
    }

    #[tokio::test]
    async fn resolving_twice_yields_the_same_set() {
        let fleet = FakeFleet::new();
        fleet.add_instance(instance("i-a", Some("demo")), Vec::new());
        fleet.add_instance(instance("i-b", None), Vec::new());
        let filter = InstanceFilter::new(&fleet);

        let first = filter.resolve(&Selector::All).await.expect("first");
        let second = filter.resolve(&Selector::All).await.expect("second");

        assert_eq!(first, second);
        assert_eq!(fleet.calls().len(), 2, "each resolve enumerates afresh");
    }

    #[tokio::test]
    async fn resolve_propagates_provider_failures() {
        let fleet = FakeFleet::new();
        fleet.fail_listing();

        let result = InstanceFilter::new(&fleet).resolve(&Selector::All).await;
        assert!(result.is_err(), "listing failure should propagate");
    }
}
