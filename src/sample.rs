//! Built-in demo document for trying the chat without a PDF at hand.

pub const SAMPLE_FILENAME: &str = "sample-chatpdf-demo.pdf";
pub const SAMPLE_ORIGINAL_NAME: &str = "ChatPDF Demo Document";

pub const SAMPLE_CONTENT: &str = "\
ChatPDF Sample Document

Introduction to AI-Powered Document Analysis

This sample document demonstrates how you can hold a conversation with a document. Upload a PDF, ask questions in plain language, and receive answers that point back to the pages they came from.

What is ChatPDF?
ChatPDF combines document processing with a large language model. The text of each uploaded PDF is extracted, split into overlapping chunks, and the chunks most relevant to a question are handed to the model as context.

Key Features:
1. Natural Language Questions: ask about the document in everyday language
2. Grounded Answers: responses are based on passages from the document
3. Citations: answers reference the page an excerpt was taken from
4. Conversation Memory: follow-up questions see the earlier turns of the chat

How It Works:
When a PDF is uploaded the system
- extracts the text layer page by page
- splits the text into chunks of about one thousand characters
- selects the chunks that match the question
- asks the language model to answer from those chunks

Benefits:
- Faster review of long documents
- Quick access to specific facts and figures
- Better understanding through question and answer

Use Cases:
- Research paper analysis
- Legal and policy document review
- Technical manual lookups
- Study of course material
- Business report analysis

Getting Started:
Upload a PDF document and start asking questions. Try asking what the key features are, how the system works, or which use cases it supports.";
