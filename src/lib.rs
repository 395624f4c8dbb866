//! A Tho parser, assembler, and simulator.
//!
//! Tho is a teaching CPU with a 4-bit accumulator, 16 cells of 4-bit memory,
//! zero and carry flags, and 13 instructions encoded as 16-bit words.
//!
//! # Usage
//!
//! To convert Tho source code to an object file, it must be parsed and assembled:
//! ```
//! use tho::parse::parse_ast;
//! use tho::asm::{assemble, assemble_debug, ObjectFile};
//!
//! let code = "
//!     STO 0 5   // mem[0] = 5
//!     LDA 0
//!     OUT
//!     HLT
//! ";
//! let ast = parse_ast(code).unwrap();
//!
//! // Assemble AST into object file:
//! # {
//! # let ast = ast.clone();
//! let obj_file: ObjectFile = assemble(ast).unwrap();
//! # }
//! // OR:
//! let obj_file: ObjectFile = assemble_debug(ast, code).unwrap();
//! assert_eq!(obj_file.words(), [0x3050, 0x1000, 0xB000, 0xC000]);
//! ```
//!
//! Both steps can be done at once with [`asm::assemble_src`].
//!
//! Once an object file has been created, it can be executed with the simulator:
//! ```
//! # use tho::asm::assemble_src;
//! # let obj_file = assemble_src("STO 0 5 LDA 0 OUT HLT").unwrap();
//! use tho::sim::Simulator;
//! use tho::sim::output::BufferedOutput;
//!
//! let mut simulator = Simulator::new(Default::default());
//! let output = BufferedOutput::default();
//! simulator.set_output(output.clone());
//! simulator.load_obj_file(&obj_file);
//! simulator.run().unwrap(); // <-- Result can be handled accordingly
//!
//! assert_eq!(&*output.get_buffer().read().unwrap(), &[5]);
//! ```
//!
//! If more granularity is needed for simulation, there are also step and snapshot functions.
//! See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod asm;
pub mod sim;
pub mod err;
