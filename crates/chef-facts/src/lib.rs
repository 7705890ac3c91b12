//! # chef-facts - citation-backed facts from chef cookbooks
//!
//! Extracts what a cookbook declares (resources, custom resources, templates, includes and node
//! attribute reads) without executing any of it. Every fact carries a [facts::Citation]
//! pointing at the file and line it was read from.
//!
//! ```no_run
//! let cookbook = chef_facts::extract("cookbooks/nginx")?;
//! println!("{}", serde_json::to_string_pretty(&cookbook)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Introduction for developers
//!
//! Read this to understand how `chef-facts` works internally.
//!
//! ### Cookbook terms
//!
//! A cookbook is a directory:
//!
//! ```text
//! metadata.rb               name, version, depends
//! recipes/default.rb        a recipe: resource declarations, run top to bottom
//! resources/site.rb         a custom resource: provides, properties, actions
//! templates/default/x.erb   ERB templates rendered by `template` resources
//! ```
//!
//! A recipe is ruby, but written in a DSL where almost everything is a method call:
//!
//! ```ruby
//! include_recipe 'apt'                       # include
//!
//! template '/etc/nginx/nginx.conf' do        # resource: type `template`, title
//!   source 'nginx.conf.erb'                  # attribute
//!   variables(workers: node['nginx']['workers'])  # attribute read `nginx.workers`
//! end
//! ```
//!
//! ### Loading files
//!
//! see [cookbook_files::CookbookFiles]
//!
//! A directory qualifies as a cookbook when it has a `metadata.rb` (or `metadata.json`) and a
//! `recipes` or `resources` directory. Anything else is [ExtractionError::NotACookbook], the
//! only error that aborts an extraction.
//!
//! ### Parsing
//!
//! see [syntax]
//!
//! Ruby and ERB are parsed with tree-sitter. tree-sitter always produces a tree and marks
//! syntax errors inside it. Recipes and custom resources must be free of errors, otherwise the
//! file is skipped. Templates are analyzed with whatever could be parsed.
//!
//! ### Analysis
//!
//! Nothing is evaluated. Each file is analyzed on its own (in parallel) and produces plain
//! data plus a list of [issues::Issue]s.
//!
//! - recipes: resource declarations anywhere in the body, control flow is looked through
//! - custom resources: `provides`, `property` and `action` declarations, where each action
//!   body is analyzed exactly like a recipe
//! - templates: instance variables (`@port`) and node attribute reads inside `<% %>`
//!
//! Values that are not literals are kept as source text ([value::Value::Expression]) instead
//! of being guessed.
//!
//! ### Joining
//!
//! Once all files are analyzed, every `template` resource is resolved to a template file
//! (`templates/<source>`, `templates/default/<source>`, `templates/<platform>/<source>`) and
//! the findings of that file are merged in.
//!
//! ### Output
//!
//! The resulting [facts::Cookbook] serializes via [serde]. `meta.coverage` summarizes what
//! could and could not be extracted, see [coverage::CoverageReport].
//!
mod attributes;
pub mod cookbook_files;
pub mod coverage;
mod custom_resource;
mod extract;
pub mod facts;
pub mod issues;
pub mod metadata;
mod recipe;
pub mod syntax;
pub mod template;
mod util;
pub mod value;
mod visit;

pub use cookbook_files::{ExtractionError, FileParseError};
pub use extract::extract;
