use itertools::Itertools;

use super::{
    BoundCall,
    BoundVariable,
};
use crate::{
    access::{
        CallMode,
        IOType,
        PrimType,
    },
    codegen::{
        call_data_type_name,
        CodeGen,
        CodeGenBlock,
    },
    error::GenerationError,
    host::gen_leaf_calldata,
    reflection::KernelType,
    signature::KernelFunction,
};

pub(crate) const TRAMPOLINE: &str = "_trampoline";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Accessor {
    Load,
    Store,
}

impl Accessor {
    pub fn begin(&self, block: &mut CodeGenBlock, prim: PrimType, ty: &KernelType) {
        let (op, modifier) = match self {
            Self::Load => ("load", "out"),
            Self::Store => ("store", "in"),
        };
        block.append_line(format!(
            "void {op}_{}(Context context, {modifier} {ty} value)",
            prim.name()
        ));
        block.begin_block();
    }
}

impl BoundVariable {
    pub(crate) fn vector_type(&self) -> Result<&KernelType, GenerationError> {
        self.vector_type.as_ref().ok_or_else(|| {
            GenerationError::UnresolvedType {
                path: self.path.clone(),
            }
        })
    }

    /// Type of the value accessed for `prim`.
    pub(crate) fn prim_type(&self, prim: PrimType) -> Result<KernelType, GenerationError> {
        let vector_type = self.vector_type()?;
        match prim {
            PrimType::Primal => Ok(vector_type.clone()),
            PrimType::Derivative => {
                vector_type.derivative().ok_or_else(|| {
                    GenerationError::NoDerivativeType {
                        path: self.path.clone(),
                        ty: vector_type.name(),
                    }
                })
            }
        }
    }

    /// Emits the call data struct of this node, and of all its children
    /// before it.
    pub fn gen_call_data_code(&self, cg: &mut CodeGen) -> Result<(), GenerationError> {
        let Some(children) = &self.children
        else {
            return gen_leaf_calldata(cg, self);
        };

        for child in children {
            child.gen_call_data_code(cg)?;
        }

        let block = &mut cg.call_data_structs;
        block.begin_struct(call_data_type_name(&self.path));
        for child in children {
            block.declare(call_data_type_name(&child.path), &child.name);
        }

        for prim in PrimType::ALL {
            for accessor in [Accessor::Load, Accessor::Store] {
                let used_by = |child: &&BoundVariable| {
                    match accessor {
                        Accessor::Load => child.access[prim].reads(),
                        Accessor::Store => child.access[prim].writes(),
                    }
                };
                if !children.iter().any(|child| used_by(&child)) {
                    continue;
                }

                accessor.begin(block, prim, &self.prim_type(prim)?);
                for child in children.iter().filter(used_by) {
                    let op = match accessor {
                        Accessor::Load => "load",
                        Accessor::Store => "store",
                    };
                    block.append_statement(format!(
                        "{}.{op}_{}(context, value.{})",
                        child.name,
                        prim.name(),
                        child.name
                    ));
                }
                block.end_block();
            }
        }

        block.end_struct();
        block.empty_line();

        Ok(())
    }

    /// Parameter declaration for the trampoline.
    fn trampoline_parameter(&self) -> Result<String, GenerationError> {
        let no_diff = if self.kernel.no_diff || !self.differentiable {
            "no_diff "
        }
        else {
            ""
        };
        Ok(format!(
            "{no_diff}{} {} {}",
            self.kernel.io,
            self.vector_type()?,
            self.name
        ))
    }
}

impl BoundCall {
    pub fn gen_call_data_code(&self, cg: &mut CodeGen) -> Result<(), GenerationError> {
        for variable in self.iter() {
            variable.gen_call_data_code(cg)?;
            cg.call_data
                .declare(call_data_type_name(&variable.path), &variable.name);
        }
        Ok(())
    }

    /// Emits a function with the kernel function's parameter list that
    /// forwards to it, storing the return value in `_result`.
    pub fn gen_trampoline(
        &self,
        cg: &mut CodeGen,
        function: &KernelFunction,
        call_mode: CallMode,
    ) -> Result<(), GenerationError> {
        let parameters = self
            .iter()
            .map(BoundVariable::trampoline_parameter)
            .collect::<Result<Vec<_>, _>>()?;
        let arguments = self.parameters.iter().map(|p| &p.name).join(", ");

        let block = &mut cg.trampoline;
        if call_mode == CallMode::Backward {
            block.append_line("[Differentiable]");
        }
        block.append_line(format!("void {TRAMPOLINE}({})", parameters.join(", ")));
        block.begin_block();
        let call = format!("{}({arguments})", function.name());
        match &self.result {
            Some(result) => block.assign(&result.name, call),
            None => block.append_statement(call),
        }
        block.end_block();

        Ok(())
    }

    /// Emits the body of the compute entry point.
    pub fn gen_kernel_body(&self, cg: &mut CodeGen, call_mode: CallMode) -> Result<(), GenerationError> {
        match call_mode {
            CallMode::Primal => self.gen_primal_body(&mut cg.kernel),
            CallMode::Backward => self.gen_backward_body(&mut cg.kernel),
            CallMode::Forward => Err(GenerationError::UnsupportedCallMode(call_mode)),
        }
    }

    fn gen_primal_body(&self, block: &mut CodeGenBlock) -> Result<(), GenerationError> {
        for variable in self.iter() {
            block.declare(variable.vector_type()?.name(), &variable.name);
            if variable.access.primal.reads() {
                block.append_statement(load(variable, PrimType::Primal, &variable.name));
            }
        }

        block.append_statement(format!(
            "{TRAMPOLINE}({})",
            self.iter().map(|variable| &variable.name).join(", ")
        ));

        for variable in self.iter() {
            if variable.access.primal.writes() {
                block.append_statement(store(variable, PrimType::Primal, &variable.name));
            }
        }

        Ok(())
    }

    fn gen_backward_body(&self, block: &mut CodeGenBlock) -> Result<(), GenerationError> {
        let mut arguments = vec![];

        for variable in self.iter() {
            let name = &variable.name;

            match (variable.differentiable, variable.kernel.io) {
                (true, IOType::In) => {
                    let primal = format!("{name}_primal");
                    block.declare(variable.vector_type()?.name(), &primal);
                    block.append_statement(load(variable, PrimType::Primal, &primal));
                    block.append_statement(format!("var {name} = diffPair({primal})"));
                }
                (true, IOType::InOut) => {
                    let primal = format!("{name}_primal");
                    let derivative = format!("{name}_derivative");
                    block.declare(variable.vector_type()?.name(), &primal);
                    block.append_statement(load(variable, PrimType::Primal, &primal));
                    block.declare(variable.prim_type(PrimType::Derivative)?.name(), &derivative);
                    block.append_statement(load(variable, PrimType::Derivative, &derivative));
                    block.append_statement(format!("var {name} = diffPair({primal}, {derivative})"));
                }
                (true, IOType::Out) => {
                    block.declare(variable.prim_type(PrimType::Derivative)?.name(), name);
                    block.append_statement(load(variable, PrimType::Derivative, name));
                }
                // non-differentiable outputs don't take part in the backward pass
                (false, IOType::Out) => continue,
                (false, _) => {
                    block.declare(variable.vector_type()?.name(), name);
                    block.append_statement(load(variable, PrimType::Primal, name));
                }
            }

            arguments.push(name.as_str());
        }

        block.append_statement(format!(
            "bwd_diff({TRAMPOLINE})({})",
            arguments.iter().join(", ")
        ));

        for variable in self.iter() {
            if variable.access.derivative.writes() {
                block.append_statement(store(
                    variable,
                    PrimType::Derivative,
                    &format!("{}.d", variable.name),
                ));
            }
        }

        Ok(())
    }
}

fn load(variable: &BoundVariable, prim: PrimType, target: &str) -> String {
    format!(
        "call_data.{}.load_{}(_context, {target})",
        variable.name,
        prim.name()
    )
}

fn store(variable: &BoundVariable, prim: PrimType, value: &str) -> String {
    format!(
        "call_data.{}.store_{}(_context, {value})",
        variable.name,
        prim.name()
    )
}
