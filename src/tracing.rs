// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of tracing-journald-native.
//
// tracing-journald-native is free software: you can redistribute it and/or modify it under the
// terms of the GNU General Public License as published by the Free Software Foundation, either
// version 3 of the License, or (at your option) any later version.
//
// tracing-journald-native is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR
// PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// tracing-journald-native.  If not, see <http://www.gnu.org/licenses/>.

//! Primitives for mapping [`tracing`] entities to journal entries.
//!
//! [`TracingFormatter`] implementations turn [`Event`]s (and whatever they recorded about
//! [`Span`]s along the way) into a message, a severity & two bags of metadata. This module
//! provides one implementation, [`StructuredTracingFormatter`], that takes the "message" field as
//! the message, the fields of the enclosing spans as the context & the event's other fields as
//! the extra metadata.
//!
//! [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//! [`Span`]: https://docs.rs/tracing/0.1.35/tracing/struct.Span.html

use crate::{
    metadata::{merge, ErrorContext, Metadata, Value},
    priority::Severity,
};

use tracing_subscriber::{layer::Context, registry::LookupSpan};

// When the tracing-log feature is enabled, use NormalizeEvent to recover file/line metadata for
// events that originated from the `log` crate, as tracing-subscriber's fmt layer does.
#[cfg(feature = "tracing-log")]
use tracing_log::NormalizeEvent;

type StdResult<T, E> = std::result::Result<T, E>;

/// A [`tracing`] event, reduced to what goes into a journal entry.
///
/// [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
#[derive(Debug)]
pub struct Formatted {
    pub message: String,
    pub severity: Severity,
    /// Fields of the spans the event occurred in, outermost first
    pub context: Metadata,
    /// The event's own fields
    pub extra: Metadata,
}

/// Format [`tracing`] [`Event`]s into journal entries.
///
/// [`tracing`]: https://docs.rs/tracing/latest/tracing/index.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
///
/// The translation from [`tracing`] events to journal entries occurs in three parts:
///
/// 1. formatting the Event to a message, a severity & metadata
///
/// 2. laying those out as journal fields ([`assemble`])
///
/// 3. transporting the resulting datagram to journald
///
/// Trait [`TracingFormatter`] formally defines step 1. Span callbacks are offered so that
/// implementations can stash what spans record (in the span's extensions) for later events to
/// pick up; they default to doing nothing.
///
/// [`assemble`]: crate::message::assemble
pub trait TracingFormatter<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    type Error: std::error::Error + Send + Sync + 'static;
    /// An event has occurred; `Ok(None)` means it shall not produce a journal entry
    fn on_event(
        &self,
        event: &tracing::Event,
        ctx: Context<'_, S>,
    ) -> StdResult<Option<Formatted>, Self::Error>;
    /// A new span was constructed
    fn on_new_span(
        &self,
        _attrs: &tracing_core::span::Attributes<'_>,
        _id: &tracing_core::span::Id,
        _ctx: Context<'_, S>,
    ) {
    }
    /// A span recorded new values
    fn on_record(
        &self,
        _id: &tracing_core::span::Id,
        _values: &tracing_core::span::Record<'_>,
        _ctx: Context<'_, S>,
    ) {
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         field capture                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Fields recorded on a span, kept in its extensions
#[derive(Debug, Default)]
pub struct SpanFields(pub Metadata);

/// A [`tracing::field::Visit`] implementation that records fields into a [`Metadata`] bag.
///
/// The "message" field is set aside rather than recorded. Errors are recorded as
/// [`Value::Error`] located at `location` (the callsite) when there is one, as text otherwise.
pub struct FieldVisitor<'a> {
    fields: &'a mut Metadata,
    location: Option<(&'a str, u32)>,
    message: Option<String>,
}

impl<'a> FieldVisitor<'a> {
    pub fn new(fields: &'a mut Metadata, location: Option<(&'a str, u32)>) -> FieldVisitor<'a> {
        FieldVisitor {
            fields,
            location,
            message: None,
        }
    }
    /// The "message" field, if one was visited
    pub fn message(self) -> Option<String> {
        self.message
    }
    fn skip(field: &tracing::field::Field) -> bool {
        // tracing-log passes the `log` record's metadata along as fields; it's already been
        // folded into the normalized metadata.
        cfg!(feature = "tracing-log") && field.name().starts_with("log.")
    }
    fn record<V: Into<Value>>(&mut self, field: &tracing::field::Field, value: V) {
        if !Self::skip(field) {
            self.fields.insert(field.name(), value);
        }
    }
}

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.record(field, value)
    }
    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.record(field, value)
    }
    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.record(field, value)
    }
    fn record_i128(&mut self, field: &tracing::field::Field, value: i128) {
        self.record(field, value.to_string())
    }
    fn record_u128(&mut self, field: &tracing::field::Field, value: u128) {
        self.record(field, value.to_string())
    }
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.record(field, value)
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.record(field, value)
        }
    }
    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        match self.location {
            Some((file, line)) => self.record(field, ErrorContext::new(file, line)),
            None => self.record(field, value.to_string()),
        }
    }
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            // The tracing macros `info!()`, `event!()` & the like all take care to "pre-format"
            // the `message` field so that `value` actually refers to a `std::fmt::Arguments`
            // instance, which will print to a debug format without enclosing double-quotes.
            self.message = Some(format!("{:?}", value));
        } else {
            self.record(field, format!("{:?}", value))
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                  StructuredTracingFormatter                                    //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A [`TracingFormatter`] that forwards everything: the message, the event's fields & the fields
/// of every span in its scope. Events without a message are sent with an empty one.
pub struct StructuredTracingFormatter {
    map_level: Box<dyn Fn(&tracing::Level) -> Severity + Send + Sync>,
}

fn default_severity_mapping(level: &tracing::Level) -> Severity {
    Severity::from(level)
}

impl std::default::Default for StructuredTracingFormatter {
    fn default() -> Self {
        StructuredTracingFormatter {
            map_level: Box::new(default_severity_mapping),
        }
    }
}

impl StructuredTracingFormatter {
    /// Replace the default mapping from [`tracing::Level`] to [`Severity`]
    pub fn with_severity_mapping<M>(mut self, map_level: M) -> Self
    where
        M: Fn(&tracing::Level) -> Severity + Send + Sync + 'static,
    {
        self.map_level = Box::new(map_level);
        self
    }
}

impl<S> TracingFormatter<S> for StructuredTracingFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    type Error = std::convert::Infallible;

    fn on_event(
        &self,
        event: &tracing::Event,
        ctx: Context<'_, S>,
    ) -> StdResult<Option<Formatted>, Self::Error> {
        #[cfg(feature = "tracing-log")]
        let normalized_meta = event.normalized_metadata();
        #[cfg(feature = "tracing-log")]
        let meta = normalized_meta.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let meta = event.metadata();

        let mut context = Metadata::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    context = merge(&context, &fields.0);
                }
            }
        }

        let mut extra = Metadata::new();
        let location = meta.file().zip(meta.line());
        let mut visitor = FieldVisitor::new(&mut extra, location);
        event.record(&mut visitor);
        let message = visitor.message().unwrap_or_default();

        Ok(Some(Formatted {
            message,
            severity: (self.map_level)(meta.level()),
            context,
            extra,
        }))
    }

    fn on_new_span(
        &self,
        attrs: &tracing_core::span::Attributes<'_>,
        id: &tracing_core::span::Id,
        ctx: Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut fields = Metadata::new();
            let location = attrs.metadata().file().zip(attrs.metadata().line());
            let mut visitor = FieldVisitor::new(&mut fields, location);
            attrs.record(&mut visitor);
            span.extensions_mut().insert(SpanFields(fields));
        }
    }

    fn on_record(
        &self,
        id: &tracing_core::span::Id,
        values: &tracing_core::span::Record<'_>,
        ctx: Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let location = span.metadata().file().zip(span.metadata().line());
            let mut extensions = span.extensions_mut();
            if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
                values.record(&mut FieldVisitor::new(fields, location));
            }
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    use tracing::field::Visit;

    #[test]
    fn test_visitor() {
        static CALLSITE: tracing::callsite::DefaultCallsite =
            tracing::callsite::DefaultCallsite::new(&META);
        static META: tracing::Metadata<'static> = tracing::Metadata::new(
            "test event metadata",
            "test-target",
            tracing::Level::INFO,
            Some("src/tracing.rs"),
            Some(7),
            Some(module_path!()),
            tracing::field::FieldSet::new(
                &["message", "peer", "attempt", "ok", "big", "err", "log.target"],
                tracing_core::callsite::Identifier(&CALLSITE),
            ),
            tracing_core::metadata::Kind::EVENT,
        );

        let fields = META.fields();
        let field = |name: &str| fields.field(name).unwrap();

        let mut md = Metadata::new();
        let mut visitor = FieldVisitor::new(&mut md, Some(("src/tracing.rs", 7)));
        visitor.record_debug(&field("message"), &format_args!("Hello, {}!", "world"));
        visitor.record_str(&field("peer"), "10.0.0.1");
        visitor.record_i64(&field("attempt"), 3);
        visitor.record_bool(&field("ok"), true);
        visitor.record_u128(&field("big"), u128::MAX);
        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        visitor.record_error(&field("err"), &err);
        visitor.record_str(&field("log.target"), "somewhere");
        assert_eq!(visitor.message(), Some("Hello, world!".to_string()));

        let rendered: Vec<String> = md
            .iter()
            .map(|(k, v)| format!("{:?}={:?}", k, v))
            .collect();
        let mut golden = vec![
            "Name(\"peer\")=Str(\"10.0.0.1\")".to_string(),
            "Name(\"attempt\")=I64(3)".to_string(),
            "Name(\"ok\")=Bool(true)".to_string(),
            format!("Name(\"big\")=Str(\"{}\")", u128::MAX),
            "Name(\"err\")=Error(ErrorContext { file: \"src/tracing.rs\", line: 7 })".to_string(),
        ];
        if !cfg!(feature = "tracing-log") {
            golden.push("Name(\"log.target\")=Str(\"somewhere\")".to_string());
        }
        assert_eq!(rendered, golden);
    }

    #[test]
    fn test_visitor_without_location() {
        static CALLSITE: tracing::callsite::DefaultCallsite =
            tracing::callsite::DefaultCallsite::new(&META);
        static META: tracing::Metadata<'static> = tracing::Metadata::new(
            "no location",
            "test-target",
            tracing::Level::WARN,
            None,
            None,
            None,
            tracing::field::FieldSet::new(&["err"], tracing_core::callsite::Identifier(&CALLSITE)),
            tracing_core::metadata::Kind::EVENT,
        );

        let mut md = Metadata::new();
        let mut visitor = FieldVisitor::new(&mut md, None);
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        visitor.record_error(&META.fields().field("err").unwrap(), &err);
        assert!(visitor.message().is_none());
        assert!(matches!(
            md.get(&"err".into()),
            Some(Value::Str(s)) if s == "disk on fire"
        ));
    }
}
