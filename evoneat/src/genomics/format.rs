//! The line-oriented ASCII genome form: a `genomestart <id>` header,
//! `trait`/`node`/`gene` records, and a `genomeend <id>` footer.
//! Reading then writing a genome is lossless.

use crate::activations::ActivationKind;
use crate::genomics::errors::GenomeError;
use crate::genomics::genes::{gene_insert, ConnectionGene};
use crate::genomics::nodes::{NodeGene, NodeKind};
use crate::genomics::traits::{Trait, TRAIT_PARAM_COUNT};
use crate::genomics::Genome;

use std::io::{BufRead, Write};

fn malformed(line: &str, reason: &str) -> GenomeError {
    GenomeError::Serialization(format!("{} in line: {}", reason, line))
}

fn parse_token<T: std::str::FromStr>(
    tokens: &mut std::str::SplitWhitespace<'_>,
    line: &str,
    what: &str,
) -> Result<T, GenomeError> {
    tokens
        .next()
        .ok_or_else(|| malformed(line, &format!("missing {}", what)))?
        .parse()
        .map_err(|_| malformed(line, &format!("malformed {}", what)))
}

fn parse_trait_ref(
    tokens: &mut std::str::SplitWhitespace<'_>,
    line: &str,
) -> Result<Option<usize>, GenomeError> {
    let id: usize = parse_token(tokens, line, "trait reference")?;
    Ok(if id == 0 { None } else { Some(id) })
}

pub(super) fn read_genome<R: BufRead>(reader: R) -> Result<Genome, GenomeError> {
    let mut genome_id = None;
    let mut traits = Vec::new();
    let mut nodes = Vec::new();
    let mut genes: Vec<ConnectionGene> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("genomestart") => {
                genome_id = Some(parse_token(&mut tokens, line, "genome id")?);
            }
            Some("trait") => {
                let id = parse_token(&mut tokens, line, "trait id")?;
                let mut params = [0.0; TRAIT_PARAM_COUNT];
                for param in &mut params {
                    *param = parse_token(&mut tokens, line, "trait parameter")?;
                }
                traits.push(Trait::new(id, params));
            }
            Some("node") => {
                let id = parse_token(&mut tokens, line, "node id")?;
                let trait_id = parse_trait_ref(&mut tokens, line)?;
                // The sensor flag is redundant with the kind code.
                let _sensor: u8 = parse_token(&mut tokens, line, "sensor flag")?;
                let code: u8 = parse_token(&mut tokens, line, "node kind")?;
                let kind = NodeKind::from_code(code)
                    .ok_or_else(|| malformed(line, "unknown node kind"))?;
                let name: String = parse_token(&mut tokens, line, "activation name")?;
                let activation = ActivationKind::from_name(&name)?;
                let mut node = NodeGene::new(id, kind, activation);
                node.set_trait_id(trait_id);
                nodes.push(node);
            }
            Some("gene") => {
                let trait_id = parse_trait_ref(&mut tokens, line)?;
                let source = parse_token(&mut tokens, line, "source node")?;
                let target = parse_token(&mut tokens, line, "target node")?;
                let weight = parse_token(&mut tokens, line, "weight")?;
                let recurrent = parse_token(&mut tokens, line, "recurrent flag")?;
                let innovation = parse_token(&mut tokens, line, "innovation number")?;
                let mutation_num = parse_token(&mut tokens, line, "mutation number")?;
                let enabled = parse_token(&mut tokens, line, "enabled flag")?;
                gene_insert(
                    &mut genes,
                    ConnectionGene::with_trait(
                        innovation,
                        source,
                        target,
                        weight,
                        recurrent,
                        trait_id,
                        mutation_num,
                        enabled,
                    ),
                );
            }
            Some("genomeend") => {
                let end_id: usize = parse_token(&mut tokens, line, "genome id")?;
                let id = genome_id
                    .ok_or_else(|| malformed(line, "genomeend without genomestart"))?;
                if end_id != id {
                    return Err(malformed(line, "genomeend id does not match genomestart"));
                }
                let genome = Genome::new(id, traits, nodes, genes);
                genome.verify()?;
                return Ok(genome);
            }
            Some(other) => {
                return Err(malformed(line, &format!("unknown record '{}'", other)));
            }
            None => {}
        }
    }

    Err(GenomeError::Serialization(
        "genome stream ended without genomeend".to_string(),
    ))
}

pub(super) fn write_genome<W: Write>(genome: &Genome, writer: &mut W) -> Result<(), GenomeError> {
    writeln!(writer, "genomestart {}", genome.id())?;
    for t in genome.traits() {
        write!(writer, "trait {}", t.id())?;
        for param in t.params() {
            write!(writer, " {}", param)?;
        }
        writeln!(writer)?;
    }
    for node in genome.nodes() {
        writeln!(
            writer,
            "node {} {} {} {} {}",
            node.id(),
            node.trait_id().unwrap_or(0),
            u8::from(node.kind().is_sensor()),
            node.kind().code(),
            node.activation().name(),
        )?;
    }
    for gene in genome.genes() {
        writeln!(
            writer,
            "gene {} {} {} {} {} {} {} {}",
            gene.trait_id().unwrap_or(0),
            gene.source(),
            gene.target(),
            gene.weight(),
            gene.recurrent(),
            gene.innovation(),
            gene.mutation_num(),
            gene.enabled(),
        )?;
    }
    writeln!(writer, "genomeend {}", genome.id())?;
    Ok(())
}
