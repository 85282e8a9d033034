use itertools::Itertools;

use super::HostValue;
use crate::{
    access::PrimType,
    binding::{
        Accessor,
        BoundVariable,
    },
    codegen::{
        call_data_type_name,
        CodeGen,
        CodeGenBlock,
    },
    error::GenerationError,
};

const TENSOR_BUFFER: &str = r#"struct TensorBuffer<T, let N : int>
{
    StructuredBuffer<T> buffer;
    int offset;
    int strides[N];

    T get(int index[N])
    {
        int flat = offset;
        for (int i = 0; i < N; i++)
            flat += index[i] * strides[i];
        return buffer[flat];
    }
};

struct RWTensorBuffer<T, let N : int>
{
    RWStructuredBuffer<T> buffer;
    int offset;
    int strides[N];

    int flat_index(int index[N])
    {
        int flat = offset;
        for (int i = 0; i < N; i++)
            flat += index[i] * strides[i];
        return flat;
    }

    T get(int index[N])
    {
        return buffer[flat_index(index)];
    }

    void set(int index[N], T value)
    {
        buffer[flat_index(index)] = value;
    }
};
"#;

const WANG_HASH: &str = r#"uint _wang_hash(uint seed)
{
    seed = (seed ^ 61) ^ (seed >> 16);
    seed *= 9;
    seed = seed ^ (seed >> 4);
    seed *= 0x27d4eb2d;
    seed = seed ^ (seed >> 15);
    return seed;
}
"#;

/// Emits the call data struct for a leaf. What's stored depends on the host
/// value kind and on how the call accesses it.
pub(crate) fn gen_leaf_calldata(cg: &mut CodeGen, binding: &BoundVariable) -> Result<(), GenerationError> {
    let dims = binding.local_dims().ok_or_else(|| {
        GenerationError::UnresolvedMapping {
            path: binding.path.clone(),
        }
    })?;
    let vector_type = binding.vector_type()?.clone();

    // the index into a by-value host type, one subscript per mapped dimension
    let subscripts = dims.iter().map(|dim| format!("[{dim}]")).join("");

    let invalid_access = || {
        GenerationError::InvalidAccess {
            path: binding.path.clone(),
            kind: binding.value.kind_name(),
            access: binding.access,
        }
    };

    match &binding.value {
        HostValue::Scalar(ty) => {
            if binding.access.writes() || !binding.access.derivative.is_none() {
                return Err(invalid_access());
            }

            let block = begin(cg, binding);
            block.declare(ty.name(), "value");
            if binding.access.primal.reads() {
                Accessor::Load.begin(block, PrimType::Primal, &vector_type);
                block.assign("value", format!("this.value{subscripts}"));
                block.end_block();
            }
            end(block);
        }
        HostValue::ValueRef(ty) => {
            if !binding.access.derivative.is_none() {
                return Err(invalid_access());
            }

            let block = begin(cg, binding);
            if binding.access.primal.writes() {
                block.declare(format!("RWStructuredBuffer<{ty}>"), "value");
            }
            else {
                block.declare(ty.name(), "value");
            }

            let element = if binding.access.primal.writes() {
                format!("this.value[0]{subscripts}")
            }
            else {
                format!("this.value{subscripts}")
            };
            if binding.access.primal.reads() {
                Accessor::Load.begin(block, PrimType::Primal, &vector_type);
                block.assign("value", &element);
                block.end_block();
            }
            if binding.access.primal.writes() {
                Accessor::Store.begin(block, PrimType::Primal, &vector_type);
                block.assign(&element, "value");
                block.end_block();
            }
            end(block);
        }
        HostValue::NdBuffer(_) => {
            cg.add_snippet("tensor_buffer", || TENSOR_BUFFER.to_owned());
            let rank = dims.len().max(1);
            let index = if dims.is_empty() {
                "0".to_owned()
            }
            else {
                dims.iter().join(", ")
            };

            let prims = PrimType::ALL
                .into_iter()
                .filter(|prim| !binding.access[*prim].is_none())
                .map(|prim| binding.prim_type(prim).map(|ty| (prim, ty)))
                .collect::<Result<Vec<_>, _>>()?;

            let block = begin(cg, binding);
            for (prim, ty) in &prims {
                let storage = if binding.access[*prim].writes() {
                    "RWTensorBuffer"
                }
                else {
                    "TensorBuffer"
                };
                block.declare(format!("{storage}<{ty}, {rank}>"), prim.name());
            }
            for (prim, ty) in &prims {
                let access = binding.access[*prim];
                if access.reads() {
                    Accessor::Load.begin(block, *prim, ty);
                    block.append_statement(format!("int _idx[{rank}] = {{ {index} }}"));
                    block.assign("value", format!("{}.get(_idx)", prim.name()));
                    block.end_block();
                }
                if access.writes() {
                    Accessor::Store.begin(block, *prim, ty);
                    block.append_statement(format!("int _idx[{rank}] = {{ {index} }}"));
                    block.append_statement(format!("{}.set(_idx, value)", prim.name()));
                    block.end_block();
                }
            }
            end(block);
        }
        HostValue::StructuredBuffer(_) => {
            if binding.access.writes() || !binding.access.derivative.is_none() {
                return Err(invalid_access());
            }

            let block = begin(cg, binding);
            block.declare(vector_type.name(), "value");
            if binding.access.primal.reads() {
                Accessor::Load.begin(block, PrimType::Primal, &vector_type);
                block.assign("value", "this.value");
                block.end_block();
            }
            end(block);
        }
        HostValue::WangHash(hash) => {
            if binding.access.writes() || !binding.access.derivative.is_none() {
                return Err(invalid_access());
            }

            cg.add_snippet("wang_hash", || WANG_HASH.to_owned());
            let call_rank = cg.call_rank();

            let block = begin(cg, binding);
            block.declare("uint", "seed");
            if binding.access.primal.reads() {
                Accessor::Load.begin(block, PrimType::Primal, &vector_type);
                gen_wang_hash(block, hash.dims, call_rank);
                block.end_block();
            }
            end(block);
        }
        HostValue::Composite(_) | HostValue::Output => {
            return Err(GenerationError::UnresolvedType {
                path: binding.path.clone(),
            });
        }
    }

    Ok(())
}

fn begin<'a>(cg: &'a mut CodeGen, binding: &BoundVariable) -> &'a mut CodeGenBlock {
    let block = &mut cg.call_data_structs;
    block.begin_struct(call_data_type_name(&binding.path));
    block
}

fn end(block: &mut CodeGenBlock) {
    block.end_struct();
    block.empty_line();
}

/// Hashes the seed with every call coordinate, then derives one component
/// per dimension.
fn gen_wang_hash(block: &mut CodeGenBlock, dims: usize, call_rank: usize) {
    block.append_statement("uint hash = seed");
    block.append_line(format!("for (int i = 0; i < {call_rank}; i++)"));
    block.begin_block();
    block.assign("hash", "_wang_hash(hash ^ uint(context.call_id[i]))");
    block.end_block();

    if dims == 1 {
        block.assign("value", "hash");
        return;
    }

    for component in 0..dims {
        if component > 0 {
            block.assign("hash", "_wang_hash(hash)");
        }
        block.assign(format!("value[{component}]"), "hash");
    }
}
