//! Query composition
//!
//! Composition steps are plain data ([`Filter`], [`OrderBy`], [`Include`],
//! [`Page`]) recorded on a [`Composition`]. The composer functions below are
//! the only way they are combined, and [`QueryOptions::apply`] always runs
//! them in the same order:
//!
//! 1. includes
//! 2. filter
//! 3. order
//! 4. page
//!
//! Nothing is executed here; evaluation happens when a terminal operation on
//! [`crate::Query`] reaches the store.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::DataError;
use crate::query::include::Include;
use crate::query::page::Page;

/// A boolean predicate over `T`
pub struct Filter<T> {
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: 'static> Filter<T> {
    pub fn new(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, entity: &T) -> bool {
        (self.predicate)(entity)
    }

    /// Intersection of two filters
    pub fn and(self, other: Filter<T>) -> Self {
        Self::new(move |entity| self.matches(entity) && other.matches(entity))
    }
}

impl<T> Clone for Filter<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

/// Sort direction of an order key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// An order key: a projection of `T` to an ordered scalar plus a direction
///
/// Sorting is stable, so entities with equal keys keep their store order.
pub struct OrderBy<T> {
    compare: Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>,
}

impl<T: 'static> OrderBy<T> {
    pub fn by<K, F>(key: F, direction: Direction) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(move |a: &T, b: &T| {
                let ordering = key(a).cmp(&key(b));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            }),
        }
    }

    pub fn asc<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self::by(key, Direction::Ascending)
    }

    pub fn desc<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self::by(key, Direction::Descending)
    }

    /// Breaks ties of `self` with `next`
    pub fn then(self, next: OrderBy<T>) -> Self {
        Self {
            compare: Arc::new(move |a: &T, b: &T| self.compare(a, b).then_with(|| next.compare(a, b))),
        }
    }

    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }

    pub(crate) fn sort(&self, items: &mut [T]) {
        items.sort_by(|a, b| self.compare(a, b));
    }
}

impl<T> Clone for OrderBy<T> {
    fn clone(&self) -> Self {
        Self {
            compare: Arc::clone(&self.compare),
        }
    }
}

impl<T> fmt::Debug for OrderBy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OrderBy(..)")
    }
}

/// The composition steps recorded on a query
pub struct Composition<T: Entity> {
    includes: Vec<Include<T>>,
    filter: Option<Filter<T>>,
    order: Option<OrderBy<T>>,
    page: Option<Page>,
}

impl<T: Entity> Composition<T> {
    pub fn new() -> Self {
        Self {
            includes: Vec::new(),
            filter: None,
            order: None,
            page: None,
        }
    }

    pub fn includes(&self) -> &[Include<T>] {
        &self.includes
    }

    pub fn filter(&self) -> Option<&Filter<T>> {
        self.filter.as_ref()
    }

    pub fn order(&self) -> Option<&OrderBy<T>> {
        self.order.as_ref()
    }

    pub fn page(&self) -> Option<Page> {
        self.page
    }

    /// Filters, orders and pages `rows`
    ///
    /// Returns the page together with the number of rows that matched the
    /// filter before paging.
    pub fn evaluate(&self, rows: Vec<T>) -> (Vec<T>, usize) {
        let mut matched: Vec<T> = match &self.filter {
            Some(filter) => rows.into_iter().filter(|row| filter.matches(row)).collect(),
            None => rows,
        };
        if let Some(order) = &self.order {
            order.sort(&mut matched);
        }
        let total = matched.len();
        let items = match self.page {
            Some(page) => page.slice(matched),
            None => matched,
        };
        (items, total)
    }
}

impl<T: Entity> Default for Composition<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Clone for Composition<T> {
    fn clone(&self) -> Self {
        Self {
            includes: self.includes.clone(),
            filter: self.filter.clone(),
            order: self.order.clone(),
            page: self.page,
        }
    }
}

impl<T: Entity> fmt::Debug for Composition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composition")
            .field("includes", &self.includes)
            .field("filtered", &self.filter.is_some())
            .field("ordered", &self.order.is_some())
            .field("page", &self.page)
            .finish()
    }
}

/// Anything carrying a [`Composition`] the composer can extend
pub trait Queryable<T: Entity>: Sized {
    fn composition(&self) -> &Composition<T>;

    fn composition_mut(&mut self) -> &mut Composition<T>;
}

impl<T: Entity> Queryable<T> for Composition<T> {
    fn composition(&self) -> &Composition<T> {
        self
    }

    fn composition_mut(&mut self) -> &mut Composition<T> {
        self
    }
}

/// Attaches eager loads; a path already present is not added twice
pub fn apply_includes<T, Q>(mut query: Q, includes: impl IntoIterator<Item = Include<T>>) -> Q
where
    T: Entity,
    Q: Queryable<T>,
{
    let composition = query.composition_mut();
    for include in includes {
        if !composition.includes.iter().any(|existing| existing.path() == include.path()) {
            composition.includes.push(include);
        }
    }
    query
}

/// Intersects the query with `filter`; `None` leaves the query unchanged
pub fn apply_filter<T, Q>(mut query: Q, filter: Option<Filter<T>>) -> Q
where
    T: Entity,
    Q: Queryable<T>,
{
    if let Some(filter) = filter {
        let composition = query.composition_mut();
        composition.filter = Some(match composition.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
    }
    query
}

/// Sets the order key, replacing any previous one
pub fn apply_order<T, Q>(mut query: Q, order: OrderBy<T>) -> Q
where
    T: Entity,
    Q: Queryable<T>,
{
    query.composition_mut().order = Some(order);
    query
}

/// Restricts the query to one page
///
/// # Errors
///
/// `DataError::InvalidArgument` for a malformed page descriptor, or when the
/// query has no order key (unordered pages are not deterministic).
pub fn paginate<T, Q>(mut query: Q, page_index: u32, page_size: u32) -> Result<Q, DataError>
where
    T: Entity,
    Q: Queryable<T>,
{
    let page = Page::new(page_index, page_size)?;
    if query.composition().order.is_none() {
        return Err(DataError::invalid_argument(format!(
            "paginating {} requires an explicit order key",
            T::entity_name()
        )));
    }
    query.composition_mut().page = Some(page);
    Ok(query)
}

/// The recognised composition steps of a bulk read
pub struct QueryOptions<T: Entity> {
    filter: Option<Filter<T>>,
    includes: Vec<Include<T>>,
    order: Option<OrderBy<T>>,
    page: Option<(u32, u32)>,
}

impl<T: Entity> QueryOptions<T> {
    pub fn new() -> Self {
        Self {
            filter: None,
            includes: Vec::new(),
            order: None,
            page: None,
        }
    }

    pub fn filter(mut self, filter: Filter<T>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Shorthand for `filter(Filter::new(predicate))`
    pub fn matching(self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.filter(Filter::new(predicate))
    }

    pub fn include(mut self, include: Include<T>) -> Self {
        self.includes.push(include);
        self
    }

    pub fn order_by(mut self, order: OrderBy<T>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn page(mut self, page_index: u32, page_size: u32) -> Self {
        self.page = Some((page_index, page_size));
        self
    }

    /// Applies the options to `query`: includes, then filter, then order,
    /// then page
    pub fn apply<Q: Queryable<T>>(self, query: Q) -> Result<Q, DataError> {
        let query = apply_includes(query, self.includes);
        let query = apply_filter(query, self.filter);
        let query = match self.order {
            Some(order) => apply_order(query, order),
            None => query,
        };
        match self.page {
            Some((page_index, page_size)) => paginate(query, page_index, page_size),
            None => Ok(query),
        }
    }
}

impl<T: Entity> Default for QueryOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}
