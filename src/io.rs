use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use log::debug;
use phylotree::tree::Tree;

use crate::error::{MaafError, Result};
use crate::maaf::Maaf;

/// Strip BEAST annotations from Newick strings.
///
/// BEAST format includes annotations like :[&rate=0.123]2.45 where 2.45 is the actual branch length.
/// This function removes the [&...] annotations while preserving the branch lengths.
fn strip_beast_annotations(newick: &str) -> String {
    let mut result = String::with_capacity(newick.len());
    let mut in_annotation = false;
    let mut chars = newick.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '[' && chars.peek() == Some(&'&') {
            in_annotation = true;
        } else if ch == ']' && in_annotation {
            in_annotation = false;
        } else if !in_annotation {
            result.push(ch);
        }
    }

    result
}

/// Parse one newick string through `phylotree`, BEAST annotations removed.
pub fn parse_newick(newick: &str) -> Result<Tree> {
    Tree::from_newick(strip_beast_annotations(newick.trim()).as_str())
        .map_err(|e| MaafError::Newick(e.to_string()))
}

/// Read every tree of a file.
///
/// NEXUS files (`tree NAME = ...` lines inside a trees block) are
/// recognized and their TRANSLATE table applied to leaf names; any other
/// file is read as a sequence of `;`-terminated newick strings.
pub fn read_trees<P: AsRef<Path>>(path: P) -> Result<Vec<Tree>> {
    let content = fs::read_to_string(path.as_ref())?;

    let blocks = collect_tree_blocks(&content);
    if !blocks.is_empty() {
        let taxons = parse_taxon_block(&content);
        return blocks
            .into_iter()
            .map(|block| {
                debug!("Parsing {}", block.header);
                let mut tree = parse_newick(&block.body)?;
                if !taxons.is_empty() {
                    rename_leaf_nodes(&mut tree, &taxons);
                }
                Ok(tree)
            })
            .collect();
    }

    content
        .split_inclusive(';')
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty() && *chunk != ";")
        .map(parse_newick)
        .collect()
}

/// The first two trees of a file.
pub fn read_tree_pair<P: AsRef<Path>>(path: P) -> Result<(Tree, Tree)> {
    let mut trees = read_trees(path)?.into_iter();
    match (trees.next(), trees.next()) {
        (Some(first), Some(second)) => Ok((first, second)),
        _ => Err(MaafError::Newick("expected two trees in the input file".to_string())),
    }
}

/// The first tree of a file.
pub fn read_tree<P: AsRef<Path>>(path: P) -> Result<Tree> {
    read_trees(path)?
        .into_iter()
        .next()
        .ok_or(MaafError::EmptyTree)
}

/// Leaf names of `first` in tree order, followed by the names only `second` has.
pub fn taxon_ordering(first: &Tree, second: &Tree) -> Vec<String> {
    let mut seen = HashSet::new();
    [first, second]
        .into_iter()
        .flat_map(|tree| {
            tree.get_leaves()
                .into_iter()
                .filter_map(|id| tree.get(&id).ok()?.name.clone())
                .collect::<Vec<_>>()
        })
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

struct TreeBlock<'a> { header: &'a str, body: String }

fn collect_tree_blocks(content: &str) -> Vec<TreeBlock<'_>> {
    content
        .lines()
        .skip_while(|line| !line.trim().to_ascii_uppercase().starts_with("TREE "))
        .take_while(|line| !line.trim().to_ascii_uppercase().starts_with("END;"))
        .filter_map(|line| {
            let mut parts = line.splitn(2, " = ");
            let header = parts.next()?.trim();
            let body = parts.next()?.trim().to_string();
            Some(TreeBlock { header, body })
        })
        .collect()
}

fn parse_taxon_block(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .skip_while(|line| !line.trim().to_ascii_uppercase().starts_with("TRANSLATE"))
        .skip(1)
        .take_while(|line| !line.trim().to_ascii_uppercase().starts_with(";"))
        // STRUCTURE:
        // 1 'Homo_sapiens',
        // 2 'Pan_troglodytes',
        .filter_map(|line| {
            let line = line.trim().trim_end_matches(',');
            let mut parts = line.split_whitespace();
            let id = parts.next()?.to_string();
            let label = parts.next()?.trim_matches('\'').to_string();
            Some((id, label))
        })
        .collect::<HashMap<_, _>>()
}

/// Replace translated leaf ids by their labels; unknown ids are kept.
pub fn rename_leaf_nodes(phylo_tree: &mut Tree, translate: &HashMap<String, String>) {
    for leaf_id in phylo_tree.get_leaves() {
        if let Ok(node) = phylo_tree.get_mut(&leaf_id) {
            if let Some(label) = node.name.as_ref().and_then(|n| translate.get(n)) {
                node.name = Some(label.clone());
            }
        }
    }
}

/// Write a text report of the forests found at hybridization number `h`.
/// If `path` ends with `.gz`, the output is gzip-compressed.
/// If `path` equals `-`, the report is written to stdout (uncompressed).
pub fn write_maafs<P: AsRef<Path>>(path: P, h: usize, maafs: &[Maaf]) -> io::Result<()> {
    let p = path.as_ref();
    let mut out: Box<dyn Write> = if p.as_os_str() == "-" {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else if p.to_string_lossy().ends_with(".gz") {
        let enc = GzEncoder::new(File::create(p)?, Compression::default());
        Box::new(BufWriter::new(enc))
    } else {
        Box::new(BufWriter::new(File::create(p)?))
    };

    render_maafs(&mut out, h, maafs)?;
    out.flush()?;
    Ok(())
}

/// Report layout: a header, then one block per forest listing its
/// components (provenance tags appended) and, when present, the two
/// reconstructed trees.
pub fn render_maafs<W: Write>(out: &mut W, h: usize, maafs: &[Maaf]) -> io::Result<()> {
    writeln!(out, "# hybridization number\t{h}")?;
    writeln!(out, "# forests\t{}", maafs.len())?;
    for (i, maaf) in maafs.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "MAAF {} ({} components)", i + 1, maaf.size())?;
        write!(out, "{maaf}")?;
        if let Some((first, second)) = &maaf.reconstructed {
            writeln!(out, "reconstructed 1\t{}", first.to_newick())?;
            writeln!(out, "reconstructed 2\t{}", second.to_newick())?;
        }
    }
    Ok(())
}
