//! Extraction pipeline
//!
//! Turns fetched markup into category descriptors, product records and an
//! optional next-page descriptor, driven entirely by a site's selector rules.
//! Every operation here is a pure function of the markup and the rules.

use crate::config::{FieldRule, PaginationMode, SiteConfig};
use crate::model::{Item, PageDescriptor};
use crate::url::{extract_domain, host_matches};
use crate::ConfigError;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// What a listing page says about its continuation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// The continuation URL is known from the markup
    Page(PageDescriptor),

    /// The continuation is behind a control that the fetch session has to
    /// activate; only the session can tell where it leads
    Control {
        selector: String,
        dismiss: Option<String>,
    },
}

#[derive(Debug)]
struct CompiledField {
    selector: Option<Selector>,
    attr: Option<String>,
}

#[derive(Debug)]
struct CompiledNextPage {
    selector: Selector,
    source: String,
    mode: PaginationMode,
    dismiss: Option<String>,
}

/// A site's rules, compiled once per run
#[derive(Debug)]
pub struct Extractor {
    base: Url,
    domain: String,
    ready: Option<Selector>,
    category: Selector,
    label_attr: Option<String>,
    container: Option<Selector>,
    item: Selector,
    name: Option<CompiledField>,
    price: Option<CompiledField>,
    old_price: Option<CompiledField>,
    id: Option<CompiledField>,
    next_page: Option<CompiledNextPage>,
}

impl Extractor {
    /// Compiles the selectors of a site
    pub fn new(site: &SiteConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(&site.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", site.base_url, e))
        })?;

        // Links are only followed on the site's own host unless a pattern says otherwise
        let domain = match &site.domain {
            Some(pattern) => pattern.to_lowercase(),
            None => extract_domain(&base).ok_or_else(|| {
                ConfigError::InvalidUrl(format!("base-url '{}' has no host", site.base_url))
            })?,
        };

        let compile = |field: &str, source: &str| compile_selector(&site.name, field, source);
        let compile_field = |field: &str, rule: &Option<FieldRule>| -> Result<_, ConfigError> {
            rule.as_ref()
                .map(|rule| {
                    Ok(CompiledField {
                        selector: rule
                            .selector
                            .as_deref()
                            .map(|s| compile(field, s))
                            .transpose()?,
                        attr: rule.attr.clone(),
                    })
                })
                .transpose()
        };

        let next_page = site
            .next_page
            .as_ref()
            .map(|rules| -> Result<_, ConfigError> {
                Ok(CompiledNextPage {
                    selector: compile("next-page.selector", &rules.selector)?,
                    source: rules.selector.clone(),
                    mode: rules.mode,
                    dismiss: rules.dismiss.clone(),
                })
            })
            .transpose()?;

        Ok(Self {
            domain,
            ready: site
                .ready_selector
                .as_deref()
                .map(|s| compile("ready-selector", s))
                .transpose()?,
            category: compile("categories.selector", &site.categories.selector)?,
            label_attr: site.categories.label_attr.clone(),
            container: site
                .items
                .container
                .as_deref()
                .map(|s| compile("items.container", s))
                .transpose()?,
            item: compile("items.selector", &site.items.selector)?,
            name: compile_field("items.name", &site.items.name)?,
            price: compile_field("items.price", &site.items.price)?,
            old_price: compile_field("items.old-price", &site.items.old_price)?,
            id: compile_field("items.id", &site.items.id)?,
            next_page,
            base,
        })
    }

    /// Pagination style of the site, if it paginates at all
    pub fn pagination_mode(&self) -> Option<PaginationMode> {
        self.next_page.as_ref().map(|n| n.mode)
    }

    /// True if `url` is on a host the site's links may lead to
    pub fn is_on_site(&self, url: &Url) -> bool {
        extract_domain(url).is_some_and(|host| host_matches(&self.domain, &host))
    }

    /// Checks that a fetched document is complete enough to extract from
    ///
    /// Without a `ready-selector` any non-blank document passes.
    pub fn is_ready(&self, content: &str) -> bool {
        if content.trim().is_empty() {
            return false;
        }
        match &self.ready {
            Some(selector) => Html::parse_document(content)
                .select(selector)
                .next()
                .is_some(),
            None => true,
        }
    }

    /// Finds the category pages linked from the site's top-level page
    ///
    /// Links are returned in document order, deduplicated by canonical URL;
    /// the first occurrence of a URL keeps its label. Links to other hosts,
    /// to the top-level page itself, and non-navigational links are dropped.
    pub fn extract_categories(&self, content: &str) -> Vec<PageDescriptor> {
        let document = Html::parse_document(content);
        let home = crate::url::normalize_parsed(self.base.clone()).ok();
        let mut seen = HashSet::new();
        let mut categories = Vec::new();

        for link in document.select(&self.category) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if !is_navigational(href) {
                continue;
            }

            let label = self.category_label(link);
            let page = match PageDescriptor::resolve(&self.base, href, label) {
                Ok(page) => page,
                Err(e) => {
                    tracing::debug!("Skipping category link '{}': {}", href, e);
                    continue;
                }
            };

            if !self.is_on_site(&page.canonical_url) {
                tracing::debug!("Skipping off-site category link {}", page.canonical_url);
                continue;
            }
            if home.as_ref() == Some(&page.canonical_url) {
                continue;
            }

            if seen.insert(page.key().to_string()) {
                categories.push(page);
            }
        }

        categories
    }

    fn category_label(&self, link: ElementRef<'_>) -> Option<String> {
        let raw = match &self.label_attr {
            Some(attr) => link.value().attr(attr).map(str::to_string),
            None => Some(link.text().collect::<String>().replace(['\n', '\r'], "")),
        };
        raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }

    /// Extracts the product records of a listing page
    ///
    /// A page without the configured container yields no items. A field
    /// whose selector matches nothing is `None` on that item.
    pub fn extract_items(&self, content: &str, page: &PageDescriptor, date: NaiveDate) -> Vec<Item> {
        let document = Html::parse_document(content);

        let scope = match &self.container {
            Some(container) => match document.select(container).next() {
                Some(element) => element,
                None => {
                    tracing::debug!("No item container on {}", page);
                    return Vec::new();
                }
            },
            None => document.root_element(),
        };

        scope
            .select(&self.item)
            .map(|block| Item {
                name: field_value(block, self.name.as_ref()),
                price: field_value(block, self.price.as_ref()),
                old_price: field_value(block, self.old_price.as_ref()),
                external_id: field_value(block, self.id.as_ref()),
                category_name: page.logical_name.clone(),
                category_label: page.label.clone(),
                date,
            })
            .collect()
    }

    /// Looks for the control leading to the next page of a listing
    ///
    /// Returns `None` when the site has no pagination rule, the control is
    /// absent or disabled, or a link control points nowhere new.
    pub fn extract_next_page(&self, content: &str, current: &PageDescriptor) -> Option<NextPage> {
        let rules = self.next_page.as_ref()?;
        let document = Html::parse_document(content);
        let control = document.select(&rules.selector).next()?;

        if is_disabled(control) {
            return None;
        }

        match rules.mode {
            PaginationMode::Link => {
                let href = link_target(control)?;
                let next = PageDescriptor::resolve(&current.fetch_url, href, current.label.clone())
                    .map_err(|e| tracing::debug!("Bad next-page link '{}' on {}: {}", href, current, e))
                    .ok()?;

                if next.key() == current.key() || !self.is_on_site(&next.canonical_url) {
                    return None;
                }
                Some(NextPage::Page(next))
            }
            PaginationMode::Click => Some(NextPage::Control {
                selector: rules.source.clone(),
                dismiss: rules.dismiss.clone(),
            }),
        }
    }
}

fn compile_selector(site: &str, field: &str, source: &str) -> Result<Selector, ConfigError> {
    Selector::parse(source).map_err(|e| ConfigError::InvalidSelector {
        site: site.to_string(),
        field: field.to_string(),
        message: e.to_string(),
    })
}

fn field_value(block: ElementRef<'_>, rule: Option<&CompiledField>) -> Option<String> {
    let rule = rule?;
    let element = match &rule.selector {
        Some(selector) => block.select(selector).next()?,
        None => block,
    };

    let value = match &rule.attr {
        Some(attr) => element.value().attr(attr)?.trim().to_string(),
        None => element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" "),
    };

    Some(value).filter(|v| !v.is_empty())
}

/// The `href` of the control, or of the first link inside it
fn link_target(control: ElementRef<'_>) -> Option<&str> {
    let href = control.value().attr("href").or_else(|| {
        let links = Selector::parse("a[href]").ok()?;
        control.select(&links).next()?.value().attr("href")
    })?;

    Some(href).filter(|h| is_navigational(h))
}

fn is_navigational(href: &str) -> bool {
    let href = href.trim();
    !(href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:"))
}

fn is_disabled(control: ElementRef<'_>) -> bool {
    let element = control.value();
    element.attr("disabled").is_some()
        || element.attr("aria-disabled") == Some("true")
        || element.classes().any(|class| class.ends_with("disabled"))
}
