//! Structure loading - program → blocks → modules → exams.
//!
//! The tree is built once per evaluation and then traversed read-only by the
//! approval, eligibility and graduation passes.

use std::collections::HashMap;
use academia_core::{
    Block, BlockId, Exam, ExamId, ExamOwner, Module, ModuleId, Program, ProgramId, ExamFilter,
};
use academia_storage::Storage;
use serde::Serialize;
use tracing::debug;
use crate::error::{ProgressionError, Result};

/// A module with its exams.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleNode {
    /// The module record
    pub module: Module,
    /// PARCIAL/RECUP exams, in tier order
    pub exams: Vec<Exam>,
}

/// A block with its modules and its own exams.
#[derive(Debug, Clone, Serialize)]
pub struct BlockNode {
    /// The block record
    pub block: Block,
    /// Modules sorted by order
    pub modules: Vec<ModuleNode>,
    /// FINAL_VIRTUAL/FINAL_SINC/EQUIVALENCIA exams, in tier order
    pub exams: Vec<Exam>,
}

impl BlockNode {
    /// A block needs at least one module to be approved or graduated.
    pub fn is_gradable(&self) -> bool {
        !self.modules.is_empty()
    }

    /// Whether the block has exactly one module, whose exams then double as
    /// the block's finals.
    pub fn is_single_module(&self) -> bool {
        self.modules.len() == 1
    }

    /// Module ids in order.
    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules.iter().map(|m| m.module.id)
    }
}

#[derive(Debug, Clone, Copy)]
struct ExamLocation {
    block: usize,
    module: Option<usize>,
    exam: usize,
}

/// In-memory program tree.
#[derive(Debug, Clone)]
pub struct ProgramStructure {
    program: Program,
    blocks: Vec<BlockNode>,
    block_index: HashMap<BlockId, usize>,
    module_index: HashMap<ModuleId, (usize, usize)>,
    exam_index: HashMap<ExamId, ExamLocation>,
}

impl ProgramStructure {
    /// Assemble the tree from fetched rows.
    ///
    /// Blocks are sorted by order within the program and modules by order
    /// within each block; module orders must run `1..=n`. Blocks without
    /// modules are kept and reported through [`Self::ungraduable_blocks`].
    pub fn build(
        program: Program,
        blocks: Vec<Block>,
        modules: Vec<Module>,
        exams: Vec<Exam>,
    ) -> Result<Self> {
        let mut blocks = blocks;
        if let Some(stray) = blocks.iter().find(|b| b.program_id != program.id) {
            return Err(ProgressionError::InvalidArgument(format!(
                "block '{}' belongs to program {}, not {}",
                stray.name, stray.program_id, program.id
            )));
        }
        blocks.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));

        let mut nodes: Vec<BlockNode> = blocks
            .into_iter()
            .map(|block| BlockNode { block, modules: Vec::new(), exams: Vec::new() })
            .collect();
        let block_index: HashMap<BlockId, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.block.id, i)).collect();

        for module in modules {
            let Some(&bi) = block_index.get(&module.block_id) else {
                return Err(ProgressionError::InvalidArgument(format!(
                    "module '{}' belongs to block {} outside program {}",
                    module.name, module.block_id, program.id
                )));
            };
            nodes[bi].modules.push(ModuleNode { module, exams: Vec::new() });
        }

        let mut module_index = HashMap::new();
        for (bi, node) in nodes.iter_mut().enumerate() {
            node.modules
                .sort_by(|a, b| a.module.order.cmp(&b.module.order).then(a.module.id.cmp(&b.module.id)));
            check_module_order(node)?;
            for (mi, m) in node.modules.iter().enumerate() {
                module_index.insert(m.module.id, (bi, mi));
            }
        }

        for exam in exams {
            exam.validate().map_err(|e| {
                ProgressionError::DataIntegrity(format!("exam {}: {}", exam.id, e))
            })?;
            match exam.owner {
                ExamOwner::Module(module_id) => {
                    let Some(&(bi, mi)) = module_index.get(&module_id) else {
                        return Err(ProgressionError::InvalidArgument(format!(
                            "exam {} belongs to module {} outside program {}",
                            exam.id, module_id, program.id
                        )));
                    };
                    nodes[bi].modules[mi].exams.push(exam);
                }
                ExamOwner::Block(block_id) => {
                    let Some(&bi) = block_index.get(&block_id) else {
                        return Err(ProgressionError::InvalidArgument(format!(
                            "exam {} belongs to block {} outside program {}",
                            exam.id, block_id, program.id
                        )));
                    };
                    nodes[bi].exams.push(exam);
                }
            }
        }

        let mut exam_index = HashMap::new();
        for (bi, node) in nodes.iter_mut().enumerate() {
            sort_exams(&mut node.exams);
            for (ei, exam) in node.exams.iter().enumerate() {
                exam_index.insert(exam.id, ExamLocation { block: bi, module: None, exam: ei });
            }
            for (mi, m) in node.modules.iter_mut().enumerate() {
                sort_exams(&mut m.exams);
                for (ei, exam) in m.exams.iter().enumerate() {
                    exam_index.insert(exam.id, ExamLocation { block: bi, module: Some(mi), exam: ei });
                }
            }
        }

        Ok(Self {
            program,
            blocks: nodes,
            block_index,
            module_index,
            exam_index,
        })
    }

    /// The program record.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Blocks in order.
    pub fn blocks(&self) -> &[BlockNode] {
        &self.blocks
    }

    /// Block ids in order.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.block.id).collect()
    }

    /// Look up a block.
    pub fn block(&self, id: BlockId) -> Option<&BlockNode> {
        self.block_index.get(&id).map(|&i| &self.blocks[i])
    }

    /// Look up a module.
    pub fn module(&self, id: ModuleId) -> Option<&ModuleNode> {
        self.module_index
            .get(&id)
            .map(|&(bi, mi)| &self.blocks[bi].modules[mi])
    }

    /// Block a module belongs to.
    pub fn block_of_module(&self, id: ModuleId) -> Option<&BlockNode> {
        self.module_index.get(&id).map(|&(bi, _)| &self.blocks[bi])
    }

    /// Look up an exam anywhere in the tree.
    pub fn exam(&self, id: ExamId) -> Option<&Exam> {
        let loc = self.exam_index.get(&id)?;
        let block = &self.blocks[loc.block];
        Some(match loc.module {
            Some(mi) => &block.modules[mi].exams[loc.exam],
            None => &block.exams[loc.exam],
        })
    }

    /// Block an exam falls under, directly or through its module.
    pub fn block_of_exam(&self, id: ExamId) -> Option<&BlockNode> {
        self.exam_index.get(&id).map(|loc| &self.blocks[loc.block])
    }

    /// Blocks with zero modules. They load fine but can never be approved.
    pub fn ungraduable_blocks(&self) -> Vec<&BlockNode> {
        self.blocks.iter().filter(|b| !b.is_gradable()).collect()
    }

    /// Total number of modules.
    pub fn module_count(&self) -> usize {
        self.module_index.len()
    }

    /// Total number of exams.
    pub fn exam_count(&self) -> usize {
        self.exam_index.len()
    }
}

fn check_module_order(node: &BlockNode) -> Result<()> {
    for pair in node.modules.windows(2) {
        if pair[0].module.order == pair[1].module.order {
            return Err(ProgressionError::DataIntegrity(format!(
                "block '{}' has modules '{}' and '{}' both at order {}",
                node.block.name, pair[0].module.name, pair[1].module.name, pair[0].module.order
            )));
        }
    }
    for (i, m) in node.modules.iter().enumerate() {
        let expected = i as u32 + 1;
        if m.module.order != expected {
            return Err(ProgressionError::DataIntegrity(format!(
                "block '{}' module '{}' has order {}, expected {}",
                node.block.name, m.module.name, m.module.order, expected
            )));
        }
    }
    Ok(())
}

fn sort_exams(exams: &mut [Exam]) {
    exams.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then(a.date.cmp(&b.date))
            .then(a.id.cmp(&b.id))
    });
}

/// Fetches a program tree through [`Storage`].
pub struct StructureLoader;

impl StructureLoader {
    /// Load and assemble the tree for one program.
    pub async fn load<S: Storage + ?Sized>(storage: &S, program_id: ProgramId) -> Result<ProgramStructure> {
        let program = storage
            .load_program(program_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("program", program_id))?;

        let blocks = storage.list_blocks(program_id).await?;
        let mut modules = Vec::new();
        let mut exams = Vec::new();

        for block in &blocks {
            exams.extend(storage.list_exams(&ExamFilter::for_block(block.id)).await?);
            for module in storage.list_modules(block.id).await? {
                exams.extend(storage.list_exams(&ExamFilter::for_module(module.id)).await?);
                modules.push(module);
            }
        }

        let structure = ProgramStructure::build(program, blocks, modules, exams)?;
        debug!(
            "Loaded program {} ({} blocks, {} modules, {} exams)",
            structure.program().code,
            structure.blocks().len(),
            structure.module_count(),
            structure.exam_count()
        );
        Ok(structure)
    }
}
