/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Named, ordered lists of request hooks.
//!
//! A [`HandlerList`] is the unit the request pipeline is built from: every stage of a request
//! owns one list, and independently authored concerns (signing, logging, validation, ...) attach
//! to it by name. Cloning a list yields an independent copy, so a client can hand each request
//! its own list to customize without touching the client's template.

use std::borrow::Cow;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by [`Handler::handle`]
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A hook invoked with exclusive access to the request being processed.
///
/// Handlers record failures on the request itself rather than returning them, so that later
/// stages can decide what to do about them.
pub trait Handler<R>: Send + Sync {
    fn handle<'a>(&'a self, request: &'a mut R) -> HandlerFuture<'a>;
}

/// Handler backed by a synchronous closure. See [`handler_fn`].
#[derive(Clone)]
pub struct FnHandler<F> {
    f: F,
}

impl<F> Debug for FnHandler<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

impl<R, F> Handler<R> for FnHandler<F>
where
    F: Fn(&mut R) + Send + Sync,
    R: Send,
{
    fn handle<'a>(&'a self, request: &'a mut R) -> HandlerFuture<'a> {
        (self.f)(request);
        Box::pin(std::future::ready(()))
    }
}

/// Returns a [`Handler`] that calls `f`.
///
/// # Examples
///
/// ```
/// use smithy_http::handler::{handler_fn, HandlerList};
///
/// let mut list = HandlerList::<Vec<&str>>::new();
/// list.push_back_named("greet", handler_fn(|req: &mut Vec<&str>| req.push("hello")));
/// let mut request = vec![];
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// list.run(&mut request).await;
/// # });
/// assert_eq!(vec!["hello"], request);
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F> {
    FnHandler { f }
}

const ANONYMOUS: &str = "__anonymous";

/// A handler paired with the name it can be targeted by
pub struct NamedHandler<R> {
    name: Cow<'static, str>,
    handler: Arc<dyn Handler<R>>,
}

impl<R> NamedHandler<R> {
    pub fn new(name: impl Into<Cow<'static, str>>, handler: impl Handler<R> + 'static) -> Self {
        NamedHandler {
            name: name.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &dyn Handler<R> {
        self.handler.as_ref()
    }
}

impl<R> Clone for NamedHandler<R> {
    fn clone(&self) -> Self {
        NamedHandler {
            name: self.name.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<R> Debug for NamedHandler<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedHandler")
            .field("name", &self.name)
            .finish()
    }
}

/// The state handed to an after-each interceptor once a handler finished running
pub struct HandlerListRunItem<'a, R> {
    /// Position of the handler that just ran
    pub index: usize,
    pub handler: &'a NamedHandler<R>,
    pub request: &'a R,
}

type AfterEach<R> = Arc<dyn Fn(&HandlerListRunItem<'_, R>) -> bool + Send + Sync>;

/// Ordered sequence of named handlers.
///
/// Iteration order is list order. Duplicate names are allowed; name-targeted operations affect
/// every entry with that name.
pub struct HandlerList<R> {
    list: Vec<NamedHandler<R>>,
    after_each: Option<AfterEach<R>>,
}

impl<R> Default for HandlerList<R> {
    fn default() -> Self {
        HandlerList {
            list: Vec::new(),
            after_each: None,
        }
    }
}

impl<R> Clone for HandlerList<R> {
    fn clone(&self) -> Self {
        HandlerList {
            list: self.list.clone(),
            after_each: self.after_each.clone(),
        }
    }
}

impl<R> Debug for HandlerList<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerList")
            .field("handlers", &self.names().collect::<Vec<_>>())
            .field("after_each", &self.after_each.is_some())
            .finish()
    }
}

impl<R> HandlerList<R> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Installs an interceptor that runs after every handler. Returning `false` stops the list.
    pub fn set_after_each(
        &mut self,
        after_each: impl Fn(&HandlerListRunItem<'_, R>) -> bool + Send + Sync + 'static,
    ) {
        self.after_each = Some(Arc::new(after_each));
    }

    pub fn clear_after_each(&mut self) {
        self.after_each = None;
    }

    pub fn has_after_each(&self) -> bool {
        self.after_each.is_some()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Removes every handler. The after-each interceptor is kept.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    /// Handler names in iteration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.list.iter().map(|h| h.name())
    }

    pub fn push_back(&mut self, handler: impl Handler<R> + 'static) {
        self.push_back_named(ANONYMOUS, handler)
    }

    pub fn push_front(&mut self, handler: impl Handler<R> + 'static) {
        self.push_front_named(ANONYMOUS, handler)
    }

    pub fn push_back_named(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        handler: impl Handler<R> + 'static,
    ) {
        self.list.push(NamedHandler::new(name, handler));
    }

    pub fn push_front_named(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        handler: impl Handler<R> + 'static,
    ) {
        self.list.insert(0, NamedHandler::new(name, handler));
    }

    /// Appends an already named handler, sharing its implementation
    pub fn push_back_handler(&mut self, handler: NamedHandler<R>) {
        self.list.push(handler);
    }

    /// Removes every handler named `name`
    pub fn remove(&mut self, name: &str) {
        self.list.retain(|h| h.name() != name);
    }

    /// Replaces the implementation of every handler named `name`, keeping its position.
    ///
    /// Returns `false` if no handler had that name.
    pub fn swap_named(&mut self, name: &str, handler: impl Handler<R> + 'static) -> bool {
        let handler: Arc<dyn Handler<R>> = Arc::new(handler);
        let mut swapped = false;
        for entry in self.list.iter_mut().filter(|h| h.name() == name) {
            entry.handler = handler.clone();
            swapped = true;
        }
        swapped
    }

    /// Replaces every handler named `name` with `replacement`, name included
    pub fn swap(&mut self, name: &str, replacement: NamedHandler<R>) -> bool {
        let mut swapped = false;
        for entry in self.list.iter_mut().filter(|h| h.name() == name) {
            *entry = replacement.clone();
            swapped = true;
        }
        swapped
    }

    /// Swaps the handler in place if one with this name exists, otherwise appends it
    pub fn set_back_named(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        handler: impl Handler<R> + 'static,
    ) {
        let named = NamedHandler::new(name, handler);
        let name = named.name.clone();
        if !self.swap(&name, named.clone()) {
            self.list.push(named);
        }
    }

    /// Swaps the handler in place if one with this name exists, otherwise prepends it
    pub fn set_front_named(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        handler: impl Handler<R> + 'static,
    ) {
        let named = NamedHandler::new(name, handler);
        let name = named.name.clone();
        if !self.swap(&name, named.clone()) {
            self.list.insert(0, named);
        }
    }

    /// Runs every handler in order against `request`.
    ///
    /// If an after-each interceptor is installed it is consulted after each handler and may
    /// stop the iteration early.
    pub async fn run(&self, request: &mut R)
    where
        R: Send,
    {
        for (index, named) in self.list.iter().enumerate() {
            named.handler.handle(request).await;
            if let Some(after_each) = &self.after_each {
                let item = HandlerListRunItem {
                    index,
                    handler: named,
                    request: &*request,
                };
                if !after_each(&item) {
                    break;
                }
            }
        }
    }
}

/// After-each interceptor that emits a debug event for every handler that ran, then continues.
pub fn log_each<R>(
    stage: &'static str,
) -> impl Fn(&HandlerListRunItem<'_, R>) -> bool + Send + Sync + 'static
where
    R: 'static,
{
    move |item| {
        tracing::debug!(
            stage = stage,
            index = item.index,
            handler = item.handler.name(),
            "ran handler"
        );
        true
    }
}

#[cfg(test)]
mod test {
    use crate::handler::{handler_fn, log_each, Handler, HandlerFuture, HandlerList};
    use tracing_test::traced_test;

    type Log = Vec<&'static str>;

    fn record(name: &'static str) -> impl Handler<Log> {
        handler_fn(move |log: &mut Log| log.push(name))
    }

    async fn run(list: &HandlerList<Log>) -> Log {
        let mut log = vec![];
        list.run(&mut log).await;
        log
    }

    #[tokio::test]
    async fn runs_in_push_order() {
        let mut list = HandlerList::new();
        list.push_back_named("b", record("b"));
        list.push_back_named("c", record("c"));
        list.push_front_named("a", record("a"));
        list.push_back(record("d"));
        assert_eq!(4, list.len());
        assert_eq!(vec!["a", "b", "c", "d"], run(&list).await);
        assert_eq!(
            vec!["a", "b", "c", "__anonymous"],
            list.names().collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn remove_drops_every_entry_with_the_name() {
        let mut list = HandlerList::new();
        list.push_back_named("dup", record("1"));
        list.push_back_named("keep", record("2"));
        list.push_back_named("dup", record("3"));
        list.remove("dup");
        assert_eq!(vec!["2"], run(&list).await);
        list.remove("missing");
        assert_eq!(1, list.len());
    }

    #[tokio::test]
    async fn swap_named_keeps_position() {
        let mut list = HandlerList::new();
        list.push_back_named("a", record("a"));
        list.push_back_named("b", record("b"));
        list.push_back_named("c", record("c"));
        assert!(list.swap_named("b", record("B")));
        assert_eq!(vec!["a", "B", "c"], run(&list).await);
        assert!(!list.swap_named("z", record("Z")));
        assert_eq!(vec!["a", "B", "c"], run(&list).await);
    }

    #[tokio::test]
    async fn set_back_named_replaces_or_appends() {
        let mut list = HandlerList::new();
        list.push_back_named("a", record("a"));
        list.push_back_named("b", record("b"));
        list.set_back_named("a", record("A"));
        assert_eq!(vec!["A", "b"], run(&list).await);
        list.set_back_named("c", record("c"));
        assert_eq!(vec!["A", "b", "c"], run(&list).await);
        list.set_front_named("z", record("z"));
        assert_eq!(vec!["z", "A", "b", "c"], run(&list).await);
    }

    #[tokio::test]
    async fn after_each_can_stop_iteration() {
        let mut list = HandlerList::new();
        list.push_back_named("a", record("a"));
        list.push_back_named("stop", record("stop"));
        list.push_back_named("never", record("never"));
        list.set_after_each(|item| item.request.last() != Some(&"stop"));
        assert_eq!(vec!["a", "stop"], run(&list).await);
        list.clear_after_each();
        assert_eq!(vec!["a", "stop", "never"], run(&list).await);
    }

    #[tokio::test]
    async fn after_each_sees_index_and_name() {
        let mut list = HandlerList::new();
        list.push_back_named("first", record("1"));
        list.push_back_named("second", record("2"));
        list.set_after_each(|item| {
            assert_eq!(item.index + 1, item.request.len());
            item.handler.name() != "first"
        });
        assert_eq!(vec!["1"], run(&list).await);
    }

    #[tokio::test]
    async fn copies_are_independent() {
        let mut template = HandlerList::new();
        template.push_back_named("shared", record("shared"));

        let mut first = template.clone();
        first.push_back_named("debug", record("debug"));
        let mut second = template.clone();
        second.remove("shared");

        assert_eq!(vec!["shared"], run(&template).await);
        assert_eq!(vec!["shared", "debug"], run(&first).await);
        assert!(run(&second).await.is_empty());
    }

    #[tokio::test]
    async fn clear_empties_the_list() {
        let mut list = HandlerList::new();
        list.push_back(record("a"));
        list.clear();
        assert!(list.is_empty());
        assert!(run(&list).await.is_empty());
    }

    struct Yielding;

    impl Handler<Log> for Yielding {
        fn handle<'a>(&'a self, request: &'a mut Log) -> HandlerFuture<'a> {
            Box::pin(async move {
                tokio::task::yield_now().await;
                request.push("async");
            })
        }
    }

    #[tokio::test]
    async fn async_handlers_run_in_order() {
        let mut list = HandlerList::new();
        list.push_back_named("before", record("before"));
        list.push_back_named("async", Yielding);
        list.push_back_named("after", record("after"));
        assert_eq!(vec!["before", "async", "after"], run(&list).await);
    }

    #[tokio::test]
    #[traced_test]
    async fn log_each_records_handler_names() {
        let mut list = HandlerList::new();
        list.push_back_named("core.SendHandler", record("send"));
        assert!(!list.has_after_each());
        list.set_after_each(log_each("Send"));
        assert!(list.has_after_each());
        assert_eq!(vec!["send"], run(&list).await);
        assert!(logs_contain("core.SendHandler"));
    }
}
