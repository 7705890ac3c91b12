use crate::cookbook_files::{read_source, CookbookFiles, ExtractionError, FileParseError};
use crate::coverage;
use crate::custom_resource::analyze_custom_resource;
use crate::facts::{Cookbook, CustomResource, Meta, Recipe};
use crate::issues::{Issue, Issues};
use crate::metadata::{read_metadata, Metadata};
use crate::recipe::analyze_recipe;
use crate::syntax::{self, Grammar};
use crate::template::{self, analyze_template, TemplateCache, TemplateFacts};
use crate::util::SourceFile;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Result of analyzing one file and the issues found on the way
type Analyzed<T> = Result<(T, Issues), FileParseError>;

/// Extract the facts of the cookbook in `dir`
///
/// Only a directory that is not a cookbook (or cannot be listed) fails. Files that cannot be
/// read or parsed are skipped and reported in the coverage notes.
#[tracing::instrument(level = "debug", skip_all, fields(dir = %dir.as_ref().display()))]
pub fn extract(dir: impl AsRef<Path>) -> Result<Cookbook, ExtractionError> {
    let files = CookbookFiles::locate(dir.as_ref())?;
    let mut issues = Issues::new();

    let metadata = match read_metadata(&files.metadata) {
        Ok(metadata) => metadata,
        Err(error) => {
            skip(&mut issues, &files, &files.metadata, &error);
            Metadata::default()
        }
    };
    let name = metadata.name.unwrap_or_else(|| files.dir_name());
    tracing::debug!(cookbook = %name, "cookbook located");

    // per file, no shared state
    let analyzed_recipes: Vec<Analyzed<Recipe>> = files
        .recipes
        .par_iter()
        .map(|path| {
            let recipe = format!("{name}::{}", file_stem(path));
            analyze_ruby(&files, &name, path, |file, issues| {
                analyze_recipe(file, recipe, issues)
            })
        })
        .collect();
    let analyzed_resources: Vec<Analyzed<CustomResource>> = files
        .resources
        .par_iter()
        .map(|path| {
            let stem = file_stem(path);
            analyze_ruby(&files, &name, path, |file, issues| {
                analyze_custom_resource(file, &stem, issues)
            })
        })
        .collect();
    let analyzed_templates: Vec<Analyzed<TemplateFacts>> = files
        .templates
        .par_iter()
        .map(|path| -> Analyzed<TemplateFacts> {
            let source = read_source(path)?;
            Ok(analyze_template(&name, &files.relative(path), &source)?)
        })
        .collect();

    // join, in file order
    let mut recipes = collect(&mut issues, &files, &files.recipes, analyzed_recipes);
    let mut custom_resources =
        collect(&mut issues, &files, &files.resources, analyzed_resources);
    let mut cache = TemplateCache::default();
    for (path, facts) in files
        .templates
        .iter()
        .zip(collect_with_paths(&mut issues, &files, &files.templates, analyzed_templates))
    {
        if let Some(facts) = facts {
            cache.insert(files.relative(path), facts);
        }
    }

    let recipe_templates = recipes
        .iter_mut()
        .flat_map(|recipe| &mut recipe.body.templates);
    let action_templates = custom_resources
        .iter_mut()
        .flat_map(|custom_resource| &mut custom_resource.actions)
        .flat_map(|action| &mut action.body.templates);
    let mut referenced = BTreeSet::new();
    for reference in recipe_templates.chain(action_templates) {
        if let Some(path) = template::enrich(&cache, reference, &mut issues) {
            referenced.insert(path);
        }
    }
    let unreferenced = cache
        .paths()
        .filter(|path| !referenced.contains(*path))
        .count();

    let coverage = coverage::aggregate(&recipes, &custom_resources, &issues, unreferenced);
    tracing::info!(
        cookbook = %name,
        recipes = coverage.recipes,
        custom_resources = coverage.custom_resources,
        files_skipped = coverage.files_skipped,
        "extracted"
    );

    Ok(Cookbook {
        root: files.root.clone(),
        name,
        version: metadata.version,
        depends: metadata.depends,
        recipes,
        custom_resources,
        meta: Meta { coverage },
    })
}

/// Read, parse and check a DSL file, then hand it to `analyze`
fn analyze_ruby<T>(
    files: &CookbookFiles,
    cookbook: &str,
    path: &Path,
    analyze: impl FnOnce(&SourceFile, &mut Issues) -> T,
) -> Analyzed<T> {
    let source = read_source(path)?;
    let tree = syntax::parse(source, Grammar::Ruby)?;
    tree.check()?;

    let relative = files.relative(path);
    let file = SourceFile::new(cookbook, &relative, &tree);
    let mut issues = Issues::new();
    let value = analyze(&file, &mut issues);
    Ok((value, issues))
}

fn collect<T>(
    issues: &mut Issues,
    files: &CookbookFiles,
    paths: &[PathBuf],
    analyzed: Vec<Analyzed<T>>,
) -> Vec<T> {
    collect_with_paths(issues, files, paths, analyzed)
        .into_iter()
        .flatten()
        .collect()
}

/// One entry per path, `None` for skipped files
fn collect_with_paths<T>(
    issues: &mut Issues,
    files: &CookbookFiles,
    paths: &[PathBuf],
    analyzed: Vec<Analyzed<T>>,
) -> Vec<Option<T>> {
    paths
        .iter()
        .zip(analyzed)
        .map(|(path, analyzed)| match analyzed {
            Ok((value, file_issues)) => {
                issues.append(file_issues);
                Some(value)
            }
            Err(error) => {
                skip(issues, files, path, &error);
                None
            }
        })
        .collect()
}

fn skip(issues: &mut Issues, files: &CookbookFiles, path: &Path, error: &FileParseError) {
    let mut reason = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        reason = format!("{reason}: {cause}");
        source = cause.source();
    }

    tracing::warn!(path = %path.display(), %reason, "skipping file");
    issues.log(Issue::FileSkipped {
        file: files.relative(path),
        reason,
    });
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
